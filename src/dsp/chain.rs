//! Effect Chain composition and application
//!
//! A chain is an ordered list of [`EffectSpec`]s applied left to right, each
//! effect consuming the previous effect's output. Random chains draw a count
//! `k` in `1..=catalog.len()`, then `k` distinct catalog entries in random
//! order, then every parameter uniformly within its range.

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::effect::{EffectKind, EffectSpec};
use crate::engine::AudioBuffer;
use crate::error::{FxError, Result};

// ============================================================================
// Catalog
// ============================================================================

/// The set of effect kinds random chains are drawn from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    kinds: Vec<EffectKind>,
}

impl Catalog {
    /// Build a catalog from a non-empty list of distinct kinds
    pub fn new(kinds: Vec<EffectKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(FxError::InvalidConfig {
                reason: "effect catalog must not be empty".to_string(),
            });
        }
        for (i, kind) in kinds.iter().enumerate() {
            if kinds[..i].contains(kind) {
                return Err(FxError::InvalidConfig {
                    reason: format!("effect '{}' listed twice in catalog", kind),
                });
            }
        }
        Ok(Self { kinds })
    }

    /// The full fixed catalog
    pub fn standard() -> Self {
        Self {
            kinds: EffectKind::ALL.to_vec(),
        }
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<EffectKind> {
        EffectKind::from_name(name).filter(|kind| self.kinds.contains(kind))
    }

    pub fn kinds(&self) -> &[EffectKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false for a constructed catalog
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// EffectChain
// ============================================================================

/// Ordered sequence of effects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectChain {
    effects: Vec<EffectSpec>,
}

impl EffectChain {
    pub fn new(effects: Vec<EffectSpec>) -> Self {
        Self { effects }
    }

    pub fn effects(&self) -> &[EffectSpec] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectSpec> {
        self.effects.iter()
    }

    /// Effect names in application order
    pub fn names(&self) -> Vec<&'static str> {
        self.effects.iter().map(EffectSpec::name).collect()
    }

    /// Apply the chain; see [`apply_chain`]
    pub fn apply(&self, buffer: &AudioBuffer) -> Result<AudioBuffer> {
        apply_chain(buffer, self)
    }
}

impl std::fmt::Display for EffectChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, spec) in self.effects.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", spec)?;
        }
        Ok(())
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Draw a random chain from `catalog`
///
/// Each call is independent; the same seeded generator state always yields
/// the same chain.
pub fn compose_random_chain<R: Rng + ?Sized>(catalog: &Catalog, rng: &mut R) -> EffectChain {
    let count = rng.gen_range(1..=catalog.len());
    // index::sample returns indices in random order, which is the application order
    let picks = index::sample(rng, catalog.len(), count);
    let effects = picks
        .iter()
        .map(|i| catalog.kinds()[i].draw(rng))
        .collect();
    let chain = EffectChain::new(effects);
    debug!("Composed chain: {}", chain);
    chain
}

/// Fold `chain` over `buffer`, returning the final buffer
///
/// The input buffer is never modified. An empty chain is the identity.
///
/// # Errors
/// * `EffectApplication` - Names the position and effect that failed and
///   wraps the underlying error
pub fn apply_chain(buffer: &AudioBuffer, chain: &EffectChain) -> Result<AudioBuffer> {
    let mut current = buffer.clone();
    for (index, spec) in chain.iter().enumerate() {
        current = spec.apply(&current).map_err(|e| FxError::EffectApplication {
            index,
            effect: spec.name().to_string(),
            source: Box::new(e),
        })?;
    }
    Ok(current)
}
