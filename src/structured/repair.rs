//! Text-level repairs for almost-JSON backend output.
//!
//! Each pass is a pure `&str -> String` transform. Passes are applied
//! cumulatively: attempt `n` re-parses the output of passes `1..=n`.

/// One repair pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPass {
    /// Drop markdown fences and prose around the outermost JSON value.
    ExtractBody,
    /// Remove commas directly before `}` or `]`.
    TrailingCommas,
    /// Close an unterminated string and any open brackets.
    CloseUnterminated,
}

impl RepairPass {
    /// Passes in application order.
    pub const ALL: [RepairPass; 3] = [
        RepairPass::ExtractBody,
        RepairPass::TrailingCommas,
        RepairPass::CloseUnterminated,
    ];

    pub fn apply(self, input: &str) -> String {
        match self {
            Self::ExtractBody => extract_body(input).to_string(),
            Self::TrailingCommas => remove_trailing_commas(input),
            Self::CloseUnterminated => close_unterminated(input),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ExtractBody => "extract-body",
            Self::TrailingCommas => "trailing-commas",
            Self::CloseUnterminated => "close-unterminated",
        }
    }
}

/// Strip a surrounding markdown code fence (with optional language tag).
///
/// Text without a leading fence is returned trimmed.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// The outermost JSON object or array in `input`, fences and prose removed.
///
/// Without a closing bracket the body runs to the end of input.
fn extract_body(input: &str) -> &str {
    let text = match input.find("```") {
        Some(at) => strip_code_fences(&input[at..]),
        None => input.trim(),
    };
    let Some(start) = text.find(['{', '[']) else {
        return text;
    };
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    match text.rfind(closer) {
        Some(end) if end > start => &text[start..=end],
        _ => &text[start..],
    }
}

fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn close_unterminated(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = input.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    while !stack.is_empty() {
        let trimmed = out.trim_end().trim_end_matches(',').trim_end().len();
        out.truncate(trimmed);
        if out.ends_with(':') {
            out.push_str(" null");
        }
        if let Some(closer) = stack.pop() {
            out.push(closer);
        }
    }
    out
}
