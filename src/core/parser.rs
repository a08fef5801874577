use crate::core::flags::FlagTable;
use crate::domain::model::{FlagId, FlagKind, OptionValue, ParsedArgs};
use crate::utils::error::{DockerwError, Result};

/// Splits a string into words the way a POSIX shell would, without
/// expansions. Used for defaults entries such as `"-it --venv -e A='b c'"`.
pub fn split_words(input: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(unterminated(input)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(unterminated(input)),
                        },
                        Some(c) => current.push(c),
                        None => return Err(unterminated(input)),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(c) = chars.next() {
                    current.push(c);
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn unterminated(input: &str) -> DockerwError {
    DockerwError::UnterminatedQuote {
        input: input.to_string(),
    }
}

/// Quotes `word` so that `split_words` yields it back unchanged.
pub fn quote_word(word: &str) -> String {
    let plain = !word.is_empty()
        && !word
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\'));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Splits every entry and concatenates the words.
pub fn split_all<S: AsRef<str>>(entries: &[S]) -> Result<Vec<String>> {
    let mut words = Vec::new();
    for entry in entries {
        words.extend(split_words(entry.as_ref())?);
    }
    Ok(words)
}

/// Parses `docker run` style arguments. Options end at `--` or at the first
/// positional token; both start the image command.
pub fn parse(tokens: &[String], table: &FlagTable) -> Result<ParsedArgs> {
    let mut parsed = ParsedArgs::default();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        if token == "--" || token == "-" || !token.starts_with('-') {
            parsed.image_cmd = tokens[i..].to_vec();
            break;
        }

        if let Some(body) = token.strip_prefix("--") {
            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (body, None),
            };
            let id = table
                .lookup_long(name)
                .ok_or_else(|| DockerwError::UnknownFlag {
                    flag: format!("--{}", name),
                })?;

            match table.spec(id).kind {
                FlagKind::Switch => match inline {
                    None => insert(&mut parsed, id, FlagKind::Switch, None),
                    Some(value) if value == "true" => {
                        insert(&mut parsed, id, FlagKind::Switch, None)
                    }
                    // dockerw switches are off unless given
                    Some(value) if value == "false" && table.spec(id).dockerw_flag().is_some() => {
                        parsed.options.remove(&id);
                    }
                    // some docker switches default to true (`--sig-proxy`),
                    // so an explicit value is passed on as written
                    Some(value) => {
                        parsed.options.insert(id, OptionValue::Value(value));
                    }
                },
                kind => {
                    let value = match inline {
                        Some(value) => value,
                        None => {
                            i += 1;
                            tokens.get(i).cloned().ok_or_else(|| DockerwError::MissingValue {
                                flag: format!("--{}", name),
                            })?
                        }
                    };
                    insert(&mut parsed, id, kind, Some(value));
                }
            }
        } else {
            let cluster: Vec<char> = token[1..].chars().collect();
            let mut j = 0;

            while j < cluster.len() {
                let short = cluster[j];
                let id = table
                    .lookup_short(short)
                    .ok_or_else(|| DockerwError::UnknownFlag {
                        flag: format!("-{}", short),
                    })?;

                match table.spec(id).kind {
                    FlagKind::Switch => {
                        insert(&mut parsed, id, FlagKind::Switch, None);
                        j += 1;
                    }
                    kind => {
                        let rest: String = cluster[j + 1..].iter().collect();
                        let rest = rest.strip_prefix('=').unwrap_or(&rest).to_string();
                        let value = if !rest.is_empty() {
                            rest
                        } else {
                            i += 1;
                            tokens.get(i).cloned().ok_or_else(|| DockerwError::MissingValue {
                                flag: format!("-{}", short),
                            })?
                        };
                        insert(&mut parsed, id, kind, Some(value));
                        break;
                    }
                }
            }
        }

        i += 1;
    }

    Ok(parsed)
}

fn insert(parsed: &mut ParsedArgs, id: FlagId, kind: FlagKind, value: Option<String>) {
    match (kind, value) {
        (FlagKind::Value, Some(value)) => {
            parsed.options.insert(id, OptionValue::Value(value));
        }
        (FlagKind::List, Some(value)) => {
            match parsed
                .options
                .entry(id)
                .or_insert_with(|| OptionValue::List(Vec::new()))
            {
                OptionValue::List(items) => items.push(value),
                other => *other = OptionValue::List(vec![value]),
            }
        }
        _ => {
            parsed.options.insert(id, OptionValue::Switch);
        }
    }
}

/// Merges expansion output into already parsed options. Lists are unioned
/// keeping first-seen order; for anything else the existing option wins.
pub fn merge(existing: &mut ParsedArgs, new: ParsedArgs) {
    for (id, value) in new.options {
        match (existing.options.get_mut(&id), value) {
            (Some(OptionValue::List(items)), OptionValue::List(new_items)) => {
                for item in new_items {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
            }
            (Some(_), _) => {}
            (None, value) => {
                existing.options.insert(id, value);
            }
        }
    }
}

/// Renders options back to `--long[=value]` arguments in table order.
pub fn render(parsed: &ParsedArgs, table: &FlagTable) -> Vec<String> {
    let mut args = Vec::new();
    for (id, value) in &parsed.options {
        let long = &table.spec(*id).long;
        match value {
            OptionValue::Switch => args.push(format!("--{}", long)),
            OptionValue::Value(value) => args.push(format!("--{}={}", long, value)),
            OptionValue::List(items) => {
                args.extend(items.iter().map(|item| format!("--{}={}", long, item)))
            }
        }
    }
    args
}
