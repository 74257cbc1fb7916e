use crate::repair::DELIMITER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// `None` means the field is missing entirely; anything unrecognized is
    /// kept as [`Gender::Unknown`] and resolved by voice assignment.
    fn from_field(field: &str) -> Option<Gender> {
        let field = field.trim().trim_matches('"').trim().to_lowercase();
        if field.is_empty() {
            return None;
        }
        Some(match field.as_str() {
            "m" | "male" => Gender::Male,
            "f" | "female" => Gender::Female,
            _ => Gender::Unknown,
        })
    }
}

/// One speaker turn, in playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRow {
    pub speaker_name: String,
    pub gender: Gender,
    pub text: String,
}

/// Parse a repaired transcript into typed rows.
///
/// Line 0 is the canonical header, so columns map positionally. Rows missing
/// a name, gender or text are dropped, not errors; a script with too few rows
/// is the caller's concern. Output order equals input line order.
pub fn parse(repaired: &str) -> Vec<TranscriptRow> {
    let mut rows = Vec::new();
    for line in repaired.lines().skip(1) {
        // The delimiter is not escaped inside fields, so anything past the
        // second one belongs to the text column.
        let mut fields = line.splitn(3, DELIMITER);
        let name = clean_field(fields.next().unwrap_or(""));
        let gender = fields.next().unwrap_or("");
        let text = clean_field(fields.next().unwrap_or(""));

        let Some(gender) = Gender::from_field(gender) else {
            continue;
        };
        if name.is_empty() || text.is_empty() {
            continue;
        }
        rows.push(TranscriptRow {
            speaker_name: name,
            gender,
            text,
        });
    }
    rows
}

fn clean_field(field: &str) -> String {
    field.trim().trim_matches('"').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_rows_in_order() {
        let repaired = "name|gender|text\nPoe Reagan|male|Hello there\nJane|female|Hi\n";
        let rows = parse(repaired);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].speaker_name, "Poe Reagan");
        assert_eq!(rows[0].gender, Gender::Male);
        assert_eq!(rows[0].text, "Hello there");
        assert_eq!(rows[1].speaker_name, "Jane");
        assert_eq!(rows[1].gender, Gender::Female);
    }

    #[test]
    fn test_strips_quotes_from_fields() {
        let rows = parse("name|gender|text\nJane|female|\"Hi everyone\"\n");
        assert_eq!(rows[0].text, "Hi everyone");
    }

    #[test]
    fn test_short_gender_aliases() {
        let rows = parse("name|gender|text\nA|m|one\nB|f|two\n");
        assert_eq!(rows[0].gender, Gender::Male);
        assert_eq!(rows[1].gender, Gender::Female);
    }

    #[test]
    fn test_unrecognized_gender_is_unknown() {
        let rows = parse("name|gender|text\nRobo|synthetic|beep\n");
        assert_eq!(rows[0].gender, Gender::Unknown);
    }

    #[test]
    fn test_rows_missing_fields_are_dropped() {
        let repaired = "name|gender|text\n|male|no name\nJane||no gender\nJane|female|\nJane|female|kept\nonly two fields|here\n";
        let rows = parse(repaired);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "kept");
    }

    #[test]
    fn test_embedded_delimiter_stays_in_text() {
        let rows = parse("name|gender|text\nJane|female|this | that\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "this | that");
    }

    #[test]
    fn test_empty_transcript_yields_no_rows() {
        assert!(parse("name|gender|text\n").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_repair_then_parse_end_to_end() {
        let raw = "Sure, here:\n```\n\"name\",\"gender\",\"text\"\nPoe Reagan|male|\"Hello there\"\nJane|female|\"Hi\"\n```";
        let rows = parse(&crate::repair::repair(raw).unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].speaker_name, "Poe Reagan");
        assert_eq!(rows[0].gender, Gender::Male);
        assert_eq!(rows[0].text, "Hello there");
        assert_eq!(rows[1].text, "Hi");
    }
}
