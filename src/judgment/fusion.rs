//! Confidence fusion: one deliberate heuristic that folds the endpoint's
//! inconsistent confidence shapes and auxiliary signals into a 0-100 score.
//!
//! The ladder runs in a fixed order and each later step reads the value the
//! earlier steps produced:
//! 1. coerce the raw value to f64 (`"85%"` and `"85"` accepted, junk is 0);
//! 2. a value in `[0, 5]` is a five-point scale, multiply by 20;
//! 3. still under 30 with non-empty reasoning earns +20;
//! 4. still under 50 with an authenticity score (even 0) adds score/10;
//! 5. clamp to `[0, 100]`.

use serde_json::Value;

use super::RawJudgment;

/// Coerce the wire confidence to f64. Unparseable input is 0.
pub fn coerce_confidence(raw: Option<&Value>) -> f64 {
    match raw {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_matches('%').trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Fuse a raw judgment into the final confidence score.
pub fn fuse_confidence(judgment: &RawJudgment) -> f64 {
    let mut confidence = coerce_confidence(judgment.confidence.as_ref());

    if (0.0..=5.0).contains(&confidence) {
        confidence *= 20.0;
    }
    if confidence < 30.0 && judgment.reasoning.as_deref().map_or(false, |r| !r.is_empty()) {
        confidence += 20.0;
    }
    if confidence < 50.0 {
        if let Some(authenticity) = judgment.authenticity_score {
            confidence += authenticity / 10.0;
        }
    }

    confidence.clamp(0.0, 100.0)
}
