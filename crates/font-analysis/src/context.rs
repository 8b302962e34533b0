/// Context-aware severity adjustment for font analysis findings
///
/// Adjusts finding severity based on the source and environment context.
use crate::model::{FontFinding, Severity};
use tracing::{debug, instrument};

/// Analysis context describing the source and environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Default)]
pub enum AnalysisContext {
    /// Font from a trusted source (e.g., system fonts, signed PDFs)
    TrustedSource,

    /// PDF with valid digital signature
    SignedPDF,

    /// Font from untrusted user input
    #[default]
    UntrustedInput,

    /// Server-side processing (stricter rules)
    Server,

    /// Desktop application (more permissive)
    Desktop,
}


impl AnalysisContext {
    /// Adjust severity based on context
    #[instrument(skip(self, finding), fields(kind = %finding.kind, original_severity = ?finding.severity))]
    pub fn adjust_severity(&self, finding: &mut FontFinding) {
        let original = finding.severity;

        finding.severity = match self {
            AnalysisContext::TrustedSource => {
                // Downgrade findings from trusted sources
                match original {
                    Severity::High => Severity::Medium,
                    Severity::Medium => Severity::Low,
                    other => other,
                }
            }
            AnalysisContext::SignedPDF => {
                // Slightly downgrade if PDF is signed (but still be cautious)
                match original {
                    Severity::Medium => Severity::Low,
                    other => other,
                }
            }
            AnalysisContext::UntrustedInput => {
                // No change - use original severity
                original
            }
            AnalysisContext::Server => {
                // Escalate on server contexts (more strict)
                match original {
                    Severity::Low => Severity::Medium,
                    Severity::Medium => Severity::High,
                    other => other,
                }
            }
            AnalysisContext::Desktop => {
                // Slight downgrade on desktop (more permissive)
                match original {
                    Severity::High => Severity::Medium,
                    other => other,
                }
            }
        };

        if finding.severity != original {
            debug!(
                context = ?self,
                original = ?original,
                adjusted = ?finding.severity,
                "Severity adjusted based on context"
            );
        }
    }

    /// Adjust all findings in a collection
    pub fn adjust_findings(&self, findings: &mut [FontFinding]) {
        for finding in findings {
            self.adjust_severity(finding);
        }
    }
}
