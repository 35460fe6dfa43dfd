//! Fragment validation: structural checks and signature verification.

use crate::crypto::Ed25519PublicKey;
use crate::error::ValidationError;
use crate::fragment::Fragment;
use crate::profile;

/// Validate a fragment against the key carried in its own key locator.
///
/// Fragments whose locator names the key instead of embedding it fail with
/// [`ValidationError::NoVerificationKey`]; use [`validate_fragment_with_key`]
/// once the key has been resolved.
pub fn validate_fragment(fragment: &Fragment) -> Result<(), ValidationError> {
    let key = fragment
        .signed_info
        .key_locator
        .key()
        .copied()
        .ok_or(ValidationError::NoVerificationKey)?;
    validate_fragment_with_key(fragment, &key)
}

/// Validate a fragment with an explicitly supplied verification key.
pub fn validate_fragment_with_key(
    fragment: &Fragment,
    key: &Ed25519PublicKey,
) -> Result<(), ValidationError> {
    validate_fragment_structure(fragment)?;

    if key.digest() != fragment.signed_info.publisher {
        return Err(ValidationError::PublisherMismatch);
    }

    key.verify(&fragment.signed_bytes(), &fragment.signature)
        .map_err(|_| ValidationError::SignatureFailed)
}

/// Validate fragment structure without signature verification.
///
/// - A gone fragment is zero-length and is the final segment of a
///   versioned name.
/// - A segment number never exceeds the declared final segment.
pub fn validate_fragment_structure(fragment: &Fragment) -> Result<(), ValidationError> {
    let segment = fragment.segment_number();

    if let (Some(segment), Some(final_segment)) = (segment, fragment.signed_info.final_segment) {
        if segment > final_segment {
            return Err(ValidationError::PastFinalSegment {
                segment,
                final_segment,
            });
        }
    }

    if fragment.is_gone() {
        if !fragment.content.is_empty() {
            return Err(ValidationError::GoneWithContent(fragment.content.len()));
        }
        if !fragment.is_final_segment() {
            return Err(ValidationError::GoneNotTerminal);
        }
        if profile::split_version(&fragment.name).is_none() {
            return Err(ValidationError::StructuralError(
                "gone fragment must carry a version".into(),
            ));
        }
    }

    Ok(())
}
