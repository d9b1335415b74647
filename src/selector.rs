use tracing::{debug, error};

use crate::{any::ServiceId, errors::SelectErrorKind, registry::Registry};

/// Strategy for choosing among several construction candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstructionPolicy {
    /// First candidate without parameters
    PreferParameterless,
    /// Candidate with the most parameters, all of which are registered
    PreferComplex,
    /// Candidate flagged as preferred, otherwise [`ConstructionPolicy::PreferComplex`]
    #[default]
    Mixed,
}

/// Construction candidate as seen by [`select`]
pub trait Candidate {
    fn parameters(&self) -> &[ServiceId];

    fn is_preferred(&self) -> bool;
}

/// Plain candidate description, mostly useful to inspect a policy's decision
#[derive(Debug, Clone, Default)]
pub struct CandidateInfo {
    pub parameters: Vec<ServiceId>,
    pub preferred: bool,
}

impl Candidate for CandidateInfo {
    #[inline]
    fn parameters(&self) -> &[ServiceId] {
        &self.parameters
    }

    #[inline]
    fn is_preferred(&self) -> bool {
        self.preferred
    }
}

/// Chooses a candidate with `policy`, returning its position in declaration order.
///
/// A parameter counts as resolvable when it is bound in `registry`, its own dependencies aren't checked.
///
/// # Errors
/// - Returns [`SelectErrorKind::NoParameterlessConstructor`] if [`ConstructionPolicy::PreferParameterless`] finds nothing
/// - Returns [`SelectErrorKind::NoViableConstructor`] if no candidate has all of its parameters registered
pub fn select<'a, C: Candidate>(
    service: &'static str,
    candidates: &'a [C],
    registry: &Registry,
    policy: ConstructionPolicy,
) -> Result<(usize, &'a C), SelectErrorKind> {
    let selected = match policy {
        ConstructionPolicy::PreferParameterless => candidates
            .iter()
            .enumerate()
            .find(|(_, candidate)| candidate.parameters().is_empty())
            .ok_or(SelectErrorKind::NoParameterlessConstructor { service }),
        ConstructionPolicy::PreferComplex => most_complex(service, candidates, registry),
        ConstructionPolicy::Mixed => match candidates.iter().enumerate().find(|(_, candidate)| candidate.is_preferred()) {
            Some(preferred) => {
                debug!("Preferred constructor found");
                Ok(preferred)
            }
            None => most_complex(service, candidates, registry),
        },
    };

    if let Err(err) = &selected {
        error!("{}", err);
    }
    selected
}

fn most_complex<'a, C: Candidate>(
    service: &'static str,
    candidates: &'a [C],
    registry: &Registry,
) -> Result<(usize, &'a C), SelectErrorKind> {
    let mut selected: Option<(usize, &'a C)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.parameters().iter().all(|parameter| registry.contains(*parameter)) {
            continue;
        }
        // Strictly greater, so the first declared candidate wins a tie
        if selected.map_or(true, |(_, best)| candidate.parameters().len() > best.parameters().len()) {
            selected = Some((index, candidate));
        }
    }
    selected.ok_or(SelectErrorKind::NoViableConstructor { service })
}
