use crate::domain::model::Record;
use crate::utils::error::{RelayError, Result};
use std::collections::BTreeSet;

/// 將回應記錄輸出為格式化 JSON
pub fn records_to_json(records: &[Record]) -> Result<String> {
    let rows: Vec<&_> = records.iter().map(|r| &r.data).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// 將回應記錄輸出為 CSV，欄位為所有記錄鍵的聯集（排序後）
pub fn records_to_csv(records: &[Record]) -> Result<String> {
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for record in records {
        for key in record.data.keys() {
            columns.insert(key.clone());
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| match record.data.get(column) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(serde_json::Value::Bool(b)) => b.to_string(),
                Some(serde_json::Value::Null) | None => String::new(),
                // 巢狀結構以緊湊 JSON 寫入單一欄位
                Some(other) => serde_json::to_string(other).unwrap_or_default(),
            })
            .collect();
        writer.write_record(&row)?;
    }

    let data = writer
        .into_inner()
        .map_err(|e| RelayError::ProcessingError {
            message: format!("CSV writer error: {}", e),
        })?;

    String::from_utf8(data).map_err(|e| RelayError::ProcessingError {
        message: format!("CSV output is not valid UTF-8: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        let mut data = HashMap::new();
        for (key, value) in pairs {
            data.insert(key.to_string(), value.clone());
        }
        Record { data }
    }

    #[test]
    fn test_csv_uses_union_of_keys() {
        let records = vec![
            record(&[
                ("id", serde_json::json!(1)),
                ("name", serde_json::json!("alice")),
            ]),
            record(&[
                ("id", serde_json::json!(2)),
                ("email", serde_json::json!("bob@example.com")),
            ]),
        ];

        let csv = records_to_csv(&records).unwrap();
        let lines: Vec<&str> = csv.trim_end().split('\n').collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "email,id,name");
        assert_eq!(lines[1], ",1,alice");
        assert_eq!(lines[2], "bob@example.com,2,");
    }

    #[test]
    fn test_csv_nested_values_become_compact_json() {
        let records = vec![record(&[
            ("id", serde_json::json!(1)),
            ("tags", serde_json::json!(["a", "b"])),
        ])];

        let csv = records_to_csv(&records).unwrap();
        let lines: Vec<&str> = csv.trim_end().split('\n').collect();

        assert_eq!(lines[0], "id,tags");
        assert_eq!(lines[1], "1,\"[\"\"a\"\",\"\"b\"\"]\"");
    }

    #[test]
    fn test_json_output_is_array_of_objects() {
        let records = vec![record(&[("id", serde_json::json!(7))])];

        let json = records_to_json(&records).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, serde_json::json!([{"id": 7}]));
    }
}
