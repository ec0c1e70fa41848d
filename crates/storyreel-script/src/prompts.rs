//! Prompt list parsing.
//!
//! Image-only jobs take their prompts from a CSV document: the first field of
//! every record, trimmed, with empty records skipped. A field that starts with
//! a double quote may contain commas, doubled quotes and line breaks; a quote
//! anywhere else is an ordinary character.

/// Extract one prompt per CSV record.
pub fn parse_prompt_csv(content: &str) -> Vec<String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut prompts = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut first_field_done = false;
    let mut field_start = true;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    if !first_field_done {
                        field.push('"');
                    }
                }
                '"' => in_quotes = false,
                _ if !first_field_done => field.push(c),
                _ => {}
            }
            continue;
        }

        match c {
            '"' if field_start => {
                in_quotes = true;
                field_start = false;
            }
            ',' => {
                first_field_done = true;
                field_start = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                push_prompt(&mut prompts, &field);
                field.clear();
                first_field_done = false;
                field_start = true;
            }
            _ => {
                field_start = false;
                if !first_field_done {
                    field.push(c);
                }
            }
        }
    }
    push_prompt(&mut prompts, &field);

    prompts
}

fn push_prompt(prompts: &mut Vec<String>, field: &str) {
    let prompt = field.trim();
    if !prompt.is_empty() {
        prompts.push(prompt.to_string());
    }
}
