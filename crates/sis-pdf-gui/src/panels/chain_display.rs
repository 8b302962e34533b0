use sis_pdf_core::chain::ExploitChain;
use sis_pdf_core::chain_render::chain_stage_summary;

pub const UNRESOLVED_CHAIN_TEXT: &str = "Unresolved chain - see linked findings for details";

#[derive(Debug, Clone, PartialEq)]
pub struct ChainSummaryDisplay {
    pub chain_index: usize,
    pub score: f64,
    pub role_label: Option<String>,
    pub narrative_summary: Option<String>,
    pub trigger: Option<String>,
    pub action: Option<String>,
    pub payload: Option<String>,
    pub all_unresolved: bool,
}

pub fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..s.floor_char_boundary(max)]
    }
}

pub fn unresolved_summary(
    chain_index: usize,
    score: f64,
    role_label: Option<String>,
) -> ChainSummaryDisplay {
    ChainSummaryDisplay {
        chain_index,
        score,
        role_label,
        narrative_summary: None,
        trigger: None,
        action: None,
        payload: None,
        all_unresolved: true,
    }
}

pub fn summary_from_chain(
    chain_index: usize,
    score: f64,
    role_label: Option<String>,
    chain: &ExploitChain,
    narrative_max: usize,
) -> ChainSummaryDisplay {
    let stage_summary = chain_stage_summary(chain);
    let narrative_summary = {
        let trimmed = chain.narrative.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(truncate_str(trimmed, narrative_max).to_string())
        }
    };
    ChainSummaryDisplay {
        chain_index,
        score,
        role_label,
        narrative_summary,
        trigger: stage_summary.trigger,
        action: stage_summary.action,
        payload: stage_summary.payload,
        all_unresolved: stage_summary.all_unresolved,
    }
}

pub fn chain_header(entry: &ChainSummaryDisplay) -> String {
    if let Some(role) = &entry.role_label {
        format!("Chain #{} [{}] score {:.2}", entry.chain_index + 1, role, entry.score)
    } else {
        format!("Chain #{} [score {:.2}]", entry.chain_index + 1, entry.score)
    }
}

pub fn render_chain_summary(
    ui: &mut egui::Ui,
    entry: &ChainSummaryDisplay,
    stage_truncate: usize,
) -> bool {
    let mut clicked = false;
    ui.group(|ui| {
        if ui.link(chain_header(entry)).clicked() {
            clicked = true;
        }
        if entry.all_unresolved {
            ui.small(UNRESOLVED_CHAIN_TEXT);
            return;
        }
        if let Some(narrative_summary) = &entry.narrative_summary {
            ui.small(narrative_summary);
            return;
        }
        show_chain_stage_labels(
            ui,
            entry.trigger.as_deref(),
            entry.action.as_deref(),
            entry.payload.as_deref(),
            stage_truncate,
        );
    });
    clicked
}

fn show_chain_stage_labels(
    ui: &mut egui::Ui,
    trigger: Option<&str>,
    action: Option<&str>,
    payload: Option<&str>,
    stage_truncate: usize,
) {
    let stages = [("Trigger", trigger), ("Action", action), ("Payload", payload)];
    for (stage, text) in stages {
        let Some(text) = text else {
            continue;
        };
        ui.horizontal(|ui| {
            ui.monospace(format!("{stage}:"));
            ui.small(truncate_str(text, stage_truncate));
        });
    }
}
