//! Risk assessment — pure classification of operation strings.
//!
//! Three priority tiers of known-dangerous patterns plus orthogonal
//! heuristics. The final score is the **maximum** across every matched rule,
//! never a sum, so any single severe match is enough to reach `Critical`.
//! Level breakpoints are fixed: ≥80 critical, ≥60 high, ≥30 medium.

use overseer_core::policy::{RiskAssessment, RiskLevel};

const SCORE_CRITICAL: u8 = 100;
const SCORE_HIGH: u8 = 75;
const SCORE_MEDIUM: u8 = 50;

/// Stateless assessor over command/path strings. No I/O, no configuration.
pub struct RiskAssessor;

impl RiskAssessor {
    /// Classify one operation string.
    ///
    /// `reasons` accumulates every matched explanation regardless of which
    /// one set the max score, for audit transparency.
    pub fn assess(operation: &str) -> RiskAssessment {
        let lower = operation.to_lowercase();
        let mut score: u8 = 0;
        let mut reasons: Vec<String> = Vec::new();

        let mut hit = |s: u8, reason: String, score: &mut u8, reasons: &mut Vec<String>| {
            *score = (*score).max(s);
            reasons.push(reason);
        };

        // ── Critical tier ──
        if is_root_deletion(&lower) {
            hit(
                SCORE_CRITICAL,
                "recursive deletion of the root filesystem".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.contains("mkfs") {
            hit(
                SCORE_CRITICAL,
                "formats a disk, destroying all data on it".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.contains("of=/dev/") || lower.contains("> /dev/sd") || lower.contains(">/dev/sd") {
            hit(
                SCORE_CRITICAL,
                "writes raw data directly to a block device".into(),
                &mut score,
                &mut reasons,
            );
        }
        if is_remote_script_piped(&lower) {
            hit(
                SCORE_CRITICAL,
                "pipes a remote script into a shell".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.contains(":(){") {
            hit(
                SCORE_CRITICAL,
                "fork bomb".into(),
                &mut score,
                &mut reasons,
            );
        }

        // ── High tier ──
        if lower.contains("git push --force") || lower.contains("git push -f") {
            hit(
                SCORE_HIGH,
                "force-push rewrites remote history".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.contains("git reset --hard") {
            hit(
                SCORE_HIGH,
                "hard reset discards local history".into(),
                &mut score,
                &mut reasons,
            );
        }
        if has_forced_recursive_rm(&lower) {
            hit(
                SCORE_HIGH,
                "forced recursive deletion".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.contains("chmod 777") || lower.contains("chmod -r 777") {
            hit(
                SCORE_HIGH,
                "grants world-writable permissions".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.split_whitespace().next() == Some("sudo") {
            hit(
                SCORE_HIGH,
                "runs with elevated privileges".into(),
                &mut score,
                &mut reasons,
            );
        }

        // ── Medium tier ──
        if is_dependency_install(&lower) {
            hit(
                SCORE_MEDIUM,
                "installs external dependencies".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.contains("git push") && !lower.contains("--force") && !lower.contains(" -f") {
            hit(
                SCORE_MEDIUM,
                "pushes to a remote repository".into(),
                &mut score,
                &mut reasons,
            );
        }

        // ── Orthogonal heuristics ──
        if operation.len() > 500 {
            hit(
                40,
                format!("excessively long input ({} chars)", operation.len()),
                &mut score,
                &mut reasons,
            );
        }
        let chain_count = count_chained(&lower);
        if chain_count > 3 {
            hit(
                40,
                format!("many chained commands ({chain_count} separators)"),
                &mut score,
                &mut reasons,
            );
        }
        if lower.contains("> /etc") || lower.contains(">> /etc") || lower.contains("> /usr")
            || lower.contains("> /boot")
        {
            hit(
                50,
                "redirects output into a system path".into(),
                &mut score,
                &mut reasons,
            );
        }
        if lower.split_whitespace().any(|t| t == "eval" || t == "exec") {
            hit(
                60,
                "dynamic code evaluation".into(),
                &mut score,
                &mut reasons,
            );
        }
        if (lower.contains("base64 -d") || lower.contains("base64 --decode"))
            && lower.contains('|')
        {
            hit(
                60,
                "decodes and pipes encoded content".into(),
                &mut score,
                &mut reasons,
            );
        }

        if reasons.is_empty() {
            reasons.push("no specific risks detected".into());
        }

        RiskAssessment {
            level: level_for(score),
            reasons,
            score,
        }
    }
}

/// Fixed breakpoints: ≥80 critical, ≥60 high, ≥30 medium, else low.
fn level_for(score: u8) -> RiskLevel {
    match score {
        80.. => RiskLevel::Critical,
        60..=79 => RiskLevel::High,
        30..=59 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// `rm` with recursive+force flags targeting `/` or `/*`.
fn is_root_deletion(lower: &str) -> bool {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let Some(rm_idx) = tokens.iter().position(|t| *t == "rm") else {
        return false;
    };
    let rest = &tokens[rm_idx + 1..];

    let mut recursive = false;
    let mut force = false;
    let mut root_target = false;
    for token in rest {
        if let Some(flags) = token.strip_prefix('-') {
            if !flags.starts_with('-') {
                recursive |= flags.contains('r');
                force |= flags.contains('f');
            }
        } else if *token == "/" || *token == "/*" {
            root_target = true;
        }
    }
    recursive && force && root_target
}

fn has_forced_recursive_rm(lower: &str) -> bool {
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    let Some(rm_idx) = tokens.iter().position(|t| *t == "rm") else {
        return false;
    };
    let mut recursive = false;
    let mut force = false;
    for token in &tokens[rm_idx + 1..] {
        if let Some(flags) = token.strip_prefix('-') {
            if !flags.starts_with('-') {
                recursive |= flags.contains('r');
                force |= flags.contains('f');
            }
        }
    }
    recursive && force
}

fn is_remote_script_piped(lower: &str) -> bool {
    let fetches = lower.contains("curl ") || lower.contains("wget ");
    if !fetches || !lower.contains('|') {
        return false;
    }
    // Anything piped into a shell after the fetch
    lower
        .split('|')
        .skip(1)
        .any(|segment| matches!(segment.trim().split_whitespace().next(), Some("sh" | "bash" | "zsh")))
}

fn is_dependency_install(lower: &str) -> bool {
    const INSTALLERS: &[&str] = &[
        "npm install",
        "npm i ",
        "yarn add",
        "pip install",
        "pip3 install",
        "cargo install",
        "apt install",
        "apt-get install",
        "brew install",
        "gem install",
    ];
    INSTALLERS.iter().any(|p| lower.contains(p))
}

/// Count command separators: `&&`, `||`, `;`, and single pipes.
fn count_chained(lower: &str) -> usize {
    let and_count = lower.matches("&&").count();
    let or_count = lower.matches("||").count();
    let semi_count = lower.matches(';').count();
    let pipe_count = lower.matches('|').count() - or_count * 2;
    and_count + or_count + semi_count + pipe_count
}
