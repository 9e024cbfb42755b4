use serde::Serialize;

use crate::db::models::TrackingRecord;

pub const EXPORT_SHEET_NAME: &str = "DSR List";

const HEADERS: [&str; 8] = [
    "Tracking ID",
    "Created",
    "Created By",
    "Last Updated",
    "Last Updated By",
    "Organization",
    "Comments",
    "Latest Comment",
];

/// A flat table ready to be written out by whatever spreadsheet writer sits
/// at the edge. Row order is the order the records were given in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn build_export_sheet(records: &[TrackingRecord]) -> ExportSheet {
    let rows = records
        .iter()
        .map(|record| {
            vec![
                record.tracking_number.clone(),
                record.created_at.to_rfc3339(),
                record.created_by.clone(),
                record.last_updated_at.to_rfc3339(),
                record.last_updated_by.clone(),
                record.organization.clone(),
                record.comments.len().to_string(),
                record
                    .comments
                    .latest()
                    .map(|c| c.comment.clone())
                    .unwrap_or_default(),
            ]
        })
        .collect();

    ExportSheet {
        name: EXPORT_SHEET_NAME.to_string(),
        headers: HEADERS.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Comment, CommentLog};
    use chrono::{TimeZone, Utc};

    fn record(tracking_number: &str, comments: Vec<&str>) -> TrackingRecord {
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        TrackingRecord {
            id: 1,
            created_at: at,
            tracking_number: tracking_number.to_string(),
            last_updated_at: at,
            last_updated_by: "u2".to_string(),
            created_by: "u1".to_string(),
            organization: "ACME".to_string(),
            comments: CommentLog::from(
                comments
                    .into_iter()
                    .map(|text| Comment {
                        date: at,
                        user: "u1".to_string(),
                        comment: text.to_string(),
                    })
                    .collect::<Vec<_>>(),
            ),
        }
    }

    #[test]
    fn test_sheet_keeps_record_order() {
        let sheet = build_export_sheet(&[
            record("PO2", vec!["first", "second"]),
            record("PO1", vec![]),
        ]);

        assert_eq!(sheet.name, "DSR List");
        assert_eq!(sheet.headers.len(), 8);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][0], "PO2");
        assert_eq!(sheet.rows[0][1], "2024-03-02T08:00:00+00:00");
        assert_eq!(sheet.rows[0][6], "2");
        assert_eq!(sheet.rows[0][7], "second");
        assert_eq!(sheet.rows[1][7], "");
        assert!(sheet.rows.iter().all(|row| row.len() == sheet.headers.len()));
    }
}
