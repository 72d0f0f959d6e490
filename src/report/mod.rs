//! # Diagnostic & Erasure Reporter
//!
//! Maps classification results and site verdicts to diagnostics and erasure
//! directives:
//!
//! | Verdict | Diagnostic | Runtime check |
//! |---|---|---|
//! | `Proved` | none | erasable |
//! | `Unknown` | per [`UnknownPolicy`] (`I0201`) | kept |
//! | `Refuted` | `E0202` error | construction disallowed |
//!
//! Kind-level codes come from the classifier: `W0101` unsupported predicate,
//! `E0102` mutable underlying type, `W0103` unsatisfiable predicate, `W0104`
//! unsupported underlying type. `W0301` reports a loop where the iteration
//! safeguard fired.

use crate::analysis::SafeguardTrip;
use crate::classify::{KindStatus, RefinementKind, RejectReason};
use crate::engine::AnalysisOptions;
use crate::error::{Error, Result};
use crate::ir::{KindId, SiteId, SourceLoc};
use crate::verify::{SiteVerdict, UnknownReason, VerificationOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks compilation
    Error,
    /// Reported, compilation continues
    Warning,
    /// Informational
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Stable diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Predicate outside every supported grammar
    W0101,
    /// Mutable underlying type
    E0102,
    /// Predicate no value satisfies
    W0103,
    /// No grammar for the underlying type
    W0104,
    /// Construction not proved
    I0201,
    /// Construction refuted
    E0202,
    /// Fixpoint iteration bound exceeded
    W0301,
}

impl DiagnosticCode {
    /// Default severity of the code
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticCode::E0102 | DiagnosticCode::E0202 => Severity::Error,
            DiagnosticCode::I0201 => Severity::Info,
            DiagnosticCode::W0101
            | DiagnosticCode::W0103
            | DiagnosticCode::W0104
            | DiagnosticCode::W0301 => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A diagnostic handed back to the host compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code
    pub code: DiagnosticCode,
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Kind the diagnostic concerns
    pub kind: Option<KindId>,
    /// Construction site, for site diagnostics
    pub site: Option<SiteId>,
    /// Enclosing function, for body diagnostics
    pub function: Option<String>,
    /// Source position
    pub location: Option<SourceLoc>,
}

impl Diagnostic {
    fn new(code: DiagnosticCode, message: String) -> Self {
        Self {
            code,
            severity: code.severity(),
            message,
            kind: None,
            site: None,
            function: None,
            location: None,
        }
    }

    /// Check if the diagnostic blocks compilation
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Diagnostic emitted for `Unknown` sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// No diagnostic
    Silent,
    /// `I0201` at info severity
    #[default]
    Info,
    /// `I0201` raised to warning severity
    Warn,
}

/// Classification outcome of one kind, as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    /// Kind identity
    pub kind: KindId,
    /// Kind name
    pub name: String,
    /// Whether construction sites of the kind are analyzed
    pub analyzed: bool,
    /// Kind-level diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of one construction site, as reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteReport {
    /// Verifier verdict
    pub verdict: SiteVerdict,
    /// The runtime predicate check at this site may be removed
    pub erase_check: bool,
    /// Site diagnostic, if any
    pub diagnostic: Option<Diagnostic>,
}

/// Reports of one function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyReport {
    /// Function name
    pub function: String,
    /// Site reports in site order
    pub sites: Vec<SiteReport>,
    /// Body-level diagnostics (iteration safeguard)
    pub diagnostics: Vec<Diagnostic>,
    /// Block visits the fixpoint needed
    pub iterations: usize,
}

impl BodyReport {
    /// Every diagnostic of the body, body-level first
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .chain(self.sites.iter().filter_map(|s| s.diagnostic.as_ref()))
    }
}

/// Reports of a whole compilation unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// One report per declared kind, in id order
    pub kinds: Vec<KindReport>,
    /// One report per body, in input order
    pub bodies: Vec<BodyReport>,
}

impl AnalysisReport {
    /// Every diagnostic: kinds first, then bodies in input order
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.kinds
            .iter()
            .flat_map(|k| k.diagnostics.iter())
            .chain(self.bodies.iter().flat_map(|b| b.diagnostics()))
            .collect()
    }

    /// Sites whose runtime check may be erased
    pub fn erasable_sites(&self) -> Vec<SiteId> {
        self.bodies
            .iter()
            .flat_map(|b| b.sites.iter())
            .filter(|s| s.erase_check)
            .map(|s| s.verdict.site)
            .collect()
    }

    /// Check if any error-severity diagnostic was produced
    pub fn blocks_compilation(&self) -> bool {
        self.diagnostics().iter().any(|d| d.is_error())
    }

    /// Report of one site
    pub fn site(&self, site: SiteId) -> Option<&SiteReport> {
        self.bodies
            .iter()
            .flat_map(|b| b.sites.iter())
            .find(|s| s.verdict.site == site)
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Turns verdicts into diagnostics and erasure directives. Total and pure.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    unknown_policy: UnknownPolicy,
    erase_proved_checks: bool,
}

impl Reporter {
    /// Create a reporter from the analysis options
    pub fn new(options: &AnalysisOptions) -> Self {
        Self {
            unknown_policy: options.unknown_policy,
            erase_proved_checks: options.erase_proved_checks,
        }
    }

    /// Report one classified kind
    pub fn report_kind(&self, kind: &RefinementKind) -> KindReport {
        let diagnostic = match &kind.status {
            KindStatus::Supported { .. } if kind.is_unsatisfiable() => Some(Diagnostic::new(
                DiagnosticCode::W0103,
                format!(
                    "no value satisfies the predicate of `{}`; every reachable construction is refuted",
                    kind.name
                ),
            )),
            KindStatus::Supported { .. } => None,
            KindStatus::Unsupported {
                reason: RejectReason::UnsupportedUnderlying(ty),
            } => Some(Diagnostic::new(
                DiagnosticCode::W0104,
                format!(
                    "`{}` wraps `{}`, which has no predicate grammar; runtime checks are kept",
                    kind.name, ty
                ),
            )),
            KindStatus::Unsupported { reason } => Some(Diagnostic::new(
                DiagnosticCode::W0101,
                format!(
                    "predicate of `{}` is not analyzable ({}); runtime checks are kept",
                    kind.name, reason
                ),
            )),
            KindStatus::Invalid { type_name } => Some(Diagnostic::new(
                DiagnosticCode::E0102,
                format!(
                    "`{}` wraps mutable type `{}`; refinement kinds require a deeply immutable underlying type",
                    kind.name, type_name
                ),
            )),
        };

        let diagnostics = diagnostic
            .map(|d| Diagnostic {
                kind: Some(kind.id),
                location: kind.location.clone(),
                ..d
            })
            .into_iter()
            .collect();

        KindReport {
            kind: kind.id,
            name: kind.name.clone(),
            analyzed: kind.is_supported(),
            diagnostics,
        }
    }

    /// Report one construction site
    pub fn report_site(&self, verdict: &SiteVerdict) -> SiteReport {
        let (erase_check, diagnostic) = match verdict.outcome {
            VerificationOutcome::Proved => (self.erase_proved_checks, None),
            VerificationOutcome::Refuted => (
                false,
                Some(Diagnostic::new(
                    DiagnosticCode::E0202,
                    format!(
                        "construction of `{}` always violates its predicate (argument is {})",
                        verdict.kind_name, verdict.argument
                    ),
                )),
            ),
            VerificationOutcome::Unknown(reason) => (false, self.unknown_diagnostic(verdict, reason)),
        };

        let diagnostic = diagnostic.map(|d| Diagnostic {
            kind: Some(verdict.kind),
            site: Some(verdict.site),
            function: Some(verdict.function.clone()),
            location: verdict.location.clone(),
            ..d
        });

        SiteReport {
            verdict: verdict.clone(),
            erase_check,
            diagnostic,
        }
    }

    fn unknown_diagnostic(&self, verdict: &SiteVerdict, reason: UnknownReason) -> Option<Diagnostic> {
        let severity = match self.unknown_policy {
            UnknownPolicy::Silent => return None,
            UnknownPolicy::Info => Severity::Info,
            UnknownPolicy::Warn => Severity::Warning,
        };
        // the kind-level diagnostic already explains rejected kinds
        if reason == UnknownReason::KindNotAnalyzed {
            return None;
        }
        let name = if verdict.kind_name.is_empty() {
            verdict.kind.to_string()
        } else {
            verdict.kind_name.clone()
        };
        Some(Diagnostic {
            severity,
            ..Diagnostic::new(
                DiagnosticCode::I0201,
                format!(
                    "construction of `{}` not proved: {} (argument is {}); runtime check kept",
                    name, reason, verdict.argument
                ),
            )
        })
    }

    /// Report a loop header where the iteration safeguard fired
    pub fn report_safeguard(&self, function: &str, trip: &SafeguardTrip) -> Diagnostic {
        Diagnostic {
            function: Some(function.to_string()),
            ..Diagnostic::new(
                DiagnosticCode::W0301,
                format!(
                    "fixpoint iteration bound exceeded at block {} after {} visits; {} forced to top",
                    trip.block,
                    trip.visits,
                    trip.forced.join(", ")
                ),
            )
        }
    }
}
