use base64::Engine;
use serde::{Deserialize, Serialize};

use super::require_text;
use crate::error::{AppError, AppResult};

string_enum!(
    ReportType {
        Lab => "lab",
        Imaging => "imaging",
        Prescription => "prescription",
        Discharge => "discharge",
        Other => "other",
    }
);

/// Report metadata; the attachment itself is served by the download endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalReport {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub uploaded_by: String,
    pub uploaded_by_name: String,
    pub appointment_id: Option<String>,
    pub title: String,
    pub report_type: ReportType,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub file_size: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportAttachment {
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Standard base64 with padding
    pub data: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

impl ReportAttachment {
    /// Decode the payload, enforcing the configured size limit on the decoded bytes
    pub fn decode(&self, max_bytes: usize) -> AppResult<Vec<u8>> {
        // Cheap upper bound before allocating
        if self.data.len() / 4 * 3 > max_bytes + 2 {
            return Err(file_too_large(max_bytes));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|_| AppError::validation("file.data must be valid base64"))?;
        if bytes.len() > max_bytes {
            return Err(file_too_large(max_bytes));
        }
        Ok(bytes)
    }
}

fn file_too_large(max_bytes: usize) -> AppError {
    AppError::FileTooLarge(format!("file exceeds the {} byte upload limit", max_bytes))
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadReportRequest {
    /// Required when a doctor uploads; ignored for patients (always themselves)
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub appointment_id: Option<String>,
    pub title: String,
    pub report_type: ReportType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file: Option<ReportAttachment>,
}

impl UploadReportRequest {
    pub fn validate(&self) -> AppResult<()> {
        require_text(&self.title, "title")?;
        if let Some(file) = &self.file {
            require_text(&file.file_name, "file.file_name")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub patient_id: String,
    pub uploaded_by: String,
    pub appointment_id: Option<String>,
    pub title: String,
    pub report_type: ReportType,
    pub description: Option<String>,
    pub file: Option<ReportFile>,
}

/// Stored attachment as returned by the download endpoint
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub patient_id: Option<String>,
    pub report_type: Option<ReportType>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(bytes: &[u8]) -> ReportAttachment {
        ReportAttachment {
            file_name: "cbc.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    #[test]
    fn test_decode_within_limit() {
        let decoded = attachment(b"hello world").decode(1024).unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn test_decode_over_limit_is_file_too_large() {
        let err = attachment(&[7u8; 2048]).decode(1024).unwrap_err();
        assert_eq!(err.code(), "FILE_TOO_LARGE");
    }

    #[test]
    fn test_decode_exact_limit_is_accepted() {
        assert!(attachment(&[1u8; 1024]).decode(1024).is_ok());
    }

    #[test]
    fn test_invalid_base64_is_validation_error() {
        let bad = ReportAttachment {
            file_name: "x.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: "***not base64***".to_string(),
        };
        assert_eq!(bad.decode(1024).unwrap_err().code(), "VALIDATION_ERROR");
    }
}
