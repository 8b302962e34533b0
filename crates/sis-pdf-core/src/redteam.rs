#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DetectorProfile {
    pub target: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvasivePDF {
    pub bytes: Vec<u8>,
    pub note: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BypassSuccess {
    pub technique: String,
}

pub struct RedTeamSimulator;

impl RedTeamSimulator {
    pub fn generate_evasive_pdf(&self, target: &DetectorProfile) -> EvasivePDF {
        let bytes = b"%PDF-1.4\n% redteam\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n".to_vec();
        EvasivePDF {
            bytes,
            note: format!("minimal_pdf_for:{}", target.target),
        }
    }

    pub fn test_bypass_techniques(&self, _detector: &str) -> Vec<BypassSuccess> {
        Vec::new()
    }
}
