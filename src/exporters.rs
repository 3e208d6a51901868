//! Block exporters: txt, csv, jsonl and xlsx renderings of canonical records.
//!
//! Every format projects the same ordered row: `message_id`, `text_content`,
//! then the optional metric columns selected by [`ExportOptions`].

use crate::error::Result;
use crate::messages::{ChatMessage, SenderId};
use rust_xlsxwriter::Workbook;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Which optional metrics to include in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_timestamp: bool,
    pub include_sender: bool,
    pub include_reactions: bool,
    pub include_reply_id: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_timestamp: true,
            include_sender: true,
            include_reactions: true,
            include_reply_id: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Csv,
    Jsonl,
    Excel,
}

impl ExportFormat {
    /// Case-insensitive; unknown names fall back to txt
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" => Self::Csv,
            "jsonl" => Self::Jsonl,
            "excel" => Self::Excel,
            _ => Self::Txt,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
            Self::Excel => "xlsx",
        }
    }

    /// Render one block in this format
    pub fn render(self, block: &[&ChatMessage], opts: &ExportOptions) -> Result<Vec<u8>> {
        Ok(match self {
            Self::Txt => export_txt(block, opts).into_bytes(),
            Self::Csv => export_csv(block, opts).into_bytes(),
            Self::Jsonl => export_jsonl(block, opts)?.into_bytes(),
            Self::Excel => export_excel(block, opts)?,
        })
    }
}

/// Projected fields of one record, in column order
struct Row(Vec<(&'static str, Value)>);

impl Row {
    fn project(msg: &ChatMessage, opts: &ExportOptions) -> Self {
        let mut fields = vec![
            ("message_id", Value::from(msg.message_id)),
            ("text_content", Value::from(msg.text_content.as_str())),
        ];
        if opts.include_timestamp {
            fields.push(("timestamp", Value::from(msg.timestamp.as_str())));
        }
        if opts.include_sender {
            let sender_id = match &msg.sender_id {
                SenderId::Int(n) => Value::from(*n),
                SenderId::Text(s) => Value::from(s.as_str()),
            };
            fields.push(("sender_id", sender_id));
            fields.push(("sender_name", Value::from(msg.sender_name.as_str())));
        }
        if opts.include_reply_id {
            fields.push(("reply_to_id", msg.reply_to_id.map_or(Value::Null, Value::from)));
        }
        if opts.include_reactions {
            fields.push(("reactions_count", Value::from(msg.reactions_count)));
        }
        Row(fields)
    }

    fn headers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(name, _)| *name)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One JSON object per line
pub fn export_jsonl(block: &[&ChatMessage], opts: &ExportOptions) -> Result<String> {
    let lines = block
        .iter()
        .map(|msg| serde_json::to_string(&Row::project(msg, opts)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

/// Header plus one line per record, minimal quoting
pub fn export_csv(block: &[&ChatMessage], opts: &ExportOptions) -> String {
    let Some(first) = block.first() else {
        return String::new();
    };

    let mut out = String::new();
    let header: Vec<_> = Row::project(first, opts).headers().collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for msg in block {
        let row = Row::project(msg, opts);
        let cells: Vec<String> = row.0.iter().map(|(_, v)| csv_field(&cell_text(v))).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Readable transcript: `[date] Name (ID: x): text {Reactions: n} [reply_to=id]`
pub fn export_txt(block: &[&ChatMessage], opts: &ExportOptions) -> String {
    block
        .iter()
        .map(|msg| {
            let mut parts = Vec::new();
            if opts.include_timestamp && !msg.timestamp.is_empty() {
                parts.push(format!("[{}]", msg.timestamp));
            }
            if opts.include_sender && !msg.sender_name.is_empty() {
                parts.push(format!("{} (ID: {}):", msg.sender_name, msg.sender_id));
            } else {
                parts.push(":".to_string());
            }
            parts.push(msg.text_content.clone());
            if opts.include_reactions && msg.reactions_count > 0 {
                parts.push(format!("{{Reactions: {}}}", msg.reactions_count));
            }
            if opts.include_reply_id {
                if let Some(reply) = msg.reply_to_id {
                    parts.push(format!("[reply_to={}]", reply));
                }
            }
            parts.join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-sheet workbook named `Messages`
pub fn export_excel(block: &[&ChatMessage], opts: &ExportOptions) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Messages")?;

        if let Some(first) = block.first() {
            for (col, name) in Row::project(first, opts).headers().enumerate() {
                sheet.write_string(0, col as u16, name)?;
            }
        }

        for (i, msg) in block.iter().enumerate() {
            let row_num = i as u32 + 1;
            for (col, (_, value)) in Row::project(msg, opts).0.iter().enumerate() {
                let col = col as u16;
                match value {
                    Value::Null => {}
                    Value::Number(n) => {
                        sheet.write_number(row_num, col, n.as_f64().unwrap_or_default())?;
                    }
                    Value::String(s) => {
                        sheet.write_string(row_num, col, s)?;
                    }
                    other => {
                        sheet.write_string(row_num, col, other.to_string())?;
                    }
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(1, "hello, \"world\"".into(), "2024-01-01 10:00:00".into(), SenderId::Text("user1".into()), "Ann".into(), None, 3),
            ChatMessage::new(2, "привет".into(), "2024-01-01 10:01:00".into(), SenderId::Int(42), "Bob".into(), Some(1), 0),
        ]
    }

    fn refs(msgs: &[ChatMessage]) -> Vec<&ChatMessage> {
        msgs.iter().collect()
    }

    #[test]
    fn test_format_parse_and_extension() {
        assert_eq!(ExportFormat::parse("CSV"), ExportFormat::Csv);
        assert_eq!(ExportFormat::parse("jsonl"), ExportFormat::Jsonl);
        assert_eq!(ExportFormat::parse("excel").extension(), "xlsx");
        assert_eq!(ExportFormat::parse("pdf"), ExportFormat::Txt);
        assert_eq!(ExportFormat::parse(""), ExportFormat::Txt);
    }

    #[test]
    fn test_jsonl_all_fields() {
        let msgs = sample();
        let out = export_jsonl(&refs(&msgs), &ExportOptions::default()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"message_id":1,"text_content":"hello, \"world\"","timestamp":"2024-01-01 10:00:00","sender_id":"user1","sender_name":"Ann","reply_to_id":null,"reactions_count":3}"#
        );
        assert!(lines[1].contains("привет"));
        assert!(lines[1].contains(r#""sender_id":42"#));
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn test_jsonl_projection() {
        let msgs = sample();
        let opts = ExportOptions {
            include_timestamp: false,
            include_sender: false,
            include_reactions: false,
            include_reply_id: false,
        };
        let out = export_jsonl(&refs(&msgs[..1]), &opts).unwrap();
        assert_eq!(out, r#"{"message_id":1,"text_content":"hello, \"world\""}"#);
    }

    #[test]
    fn test_csv_quoting_and_header() {
        let msgs = sample();
        let opts = ExportOptions {
            include_reply_id: false,
            ..ExportOptions::default()
        };
        let out = export_csv(&refs(&msgs), &opts);
        let expected = "message_id,text_content,timestamp,sender_id,sender_name,reactions_count\n\
                        1,\"hello, \"\"world\"\"\",2024-01-01 10:00:00,user1,Ann,3\n\
                        2,привет,2024-01-01 10:01:00,42,Bob,0\n";
        assert_eq!(out, expected);
        assert_eq!(export_csv(&[], &opts), "");
    }

    #[test]
    fn test_csv_null_reply_is_empty() {
        let msgs = sample();
        let out = export_csv(&refs(&msgs[..1]), &ExportOptions::default());
        assert!(out.lines().nth(1).unwrap().ends_with(",Ann,,3"));
    }

    #[test]
    fn test_txt_lines() {
        let msgs = sample();
        let out = export_txt(&refs(&msgs), &ExportOptions::default());
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines[0],
            "[2024-01-01 10:00:00] Ann (ID: user1): hello, \"world\" {Reactions: 3}"
        );
        assert_eq!(lines[1], "[2024-01-01 10:01:00] Bob (ID: 42): привет [reply_to=1]");
    }

    #[test]
    fn test_txt_without_sender() {
        let msgs = sample();
        let opts = ExportOptions {
            include_sender: false,
            include_timestamp: false,
            ..ExportOptions::default()
        };
        let out = export_txt(&refs(&msgs[1..]), &opts);
        assert_eq!(out, ": привет [reply_to=1]");
    }

    #[test]
    fn test_excel_is_zip_container() {
        let msgs = sample();
        let bytes = ExportFormat::Excel
            .render(&refs(&msgs), &ExportOptions::default())
            .unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
