//! The versioning and segmentation naming profile.
//!
//! A published object lives under `base/<version>/<segment>`. Version
//! components start with `0xFD`, segment components with `0x00`, each
//! followed by a minimal big-endian number. Everything here is pure name
//! arithmetic; nothing touches the network.

use crate::crypto::PublisherDigest;
use crate::error::CoreError;
use crate::interest::{ChildSelector, Exclude, Interest};
use crate::name::{ContentName, NameComponent};
use crate::version::VersionTag;

/// Marker byte that introduces a segment component.
pub const SEGMENT_MARKER: u8 = 0x00;

/// Number of the first segment of every version.
pub const FIRST_SEGMENT: u64 = 0;

/// Components after the base name in a fragment name: version and segment.
const VERSIONED_SUFFIX: usize = 2;

/// Encode a segment number as a name component.
pub fn segment_component(segment: u64) -> NameComponent {
    let be = segment.to_be_bytes();
    let skip = be.iter().take_while(|&&b| b == 0).count();
    let mut bytes = Vec::with_capacity(1 + be.len() - skip);
    bytes.push(SEGMENT_MARKER);
    bytes.extend_from_slice(&be[skip..]);
    NameComponent::from(bytes)
}

/// Decode a segment number from a name component.
pub fn segment_from_component(component: &NameComponent) -> Result<u64, CoreError> {
    let bytes = component.as_bytes();
    if bytes.first() != Some(&SEGMENT_MARKER) {
        return Err(CoreError::NotASegment(component.to_string()));
    }
    let digits = &bytes[1..];
    if digits.len() > 8 || digits.first() == Some(&0) {
        return Err(CoreError::NotASegment(component.to_string()));
    }
    Ok(digits.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Segment number of the terminal component, if it is a segment component.
pub fn segment_number(name: &ContentName) -> Option<u64> {
    name.last_component()
        .and_then(|c| segment_from_component(c).ok())
}

/// Split a name into its base and terminal version.
///
/// A trailing segment component is ignored. Returns `None` for unversioned
/// names.
pub fn split_version(name: &ContentName) -> Option<(ContentName, VersionTag)> {
    let mut end = name.len();
    if segment_number(name).is_some() {
        end -= 1;
    }
    let version_index = end.checked_sub(1)?;
    let tag = VersionTag::from_component(name.component(version_index)?).ok()?;
    Some((name.cut(version_index), tag))
}

/// Whether the name carries a terminal version (optionally followed by a segment).
pub fn has_terminal_version(name: &ContentName) -> bool {
    split_version(name).is_some()
}

/// The terminal version, if any.
pub fn version_of(name: &ContentName) -> Option<VersionTag> {
    split_version(name).map(|(_, tag)| tag)
}

/// The unversioned base of a name.
pub fn base_name(name: &ContentName) -> ContentName {
    match split_version(name) {
        Some((base, _)) => base,
        None => name.clone(),
    }
}

/// Name `version` of the object identified by `name`, replacing any existing
/// terminal version (and segment).
pub fn add_version(name: &ContentName, version: VersionTag) -> ContentName {
    base_name(name).append(version.to_component())
}

/// Name of segment `segment` under a versioned name.
pub fn segment_name(versioned: &ContentName, segment: u64) -> ContentName {
    versioned.append(segment_component(segment))
}

/// Name of the first segment under a versioned name.
pub fn first_segment_name(versioned: &ContentName) -> ContentName {
    segment_name(versioned, FIRST_SEGMENT)
}

/// The versioned name a fragment belongs to (its name without the segment).
pub fn versioned_prefix(name: &ContentName) -> Option<ContentName> {
    split_version(name).map(|(base, tag)| base.append(tag.to_component()))
}

/// Whether `a` names a later version than `b`.
///
/// Any versioned name is later than an unversioned one.
pub fn later_version(a: &ContentName, b: &ContentName) -> bool {
    match (version_of(a), version_of(b)) {
        (Some(va), Some(vb)) => va > vb,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Whether `candidate` lies under the base of `known` with a version
/// strictly later than the one in `known` (or any version, if `known` is
/// unversioned).
pub fn starts_with_later_version_of(candidate: &ContentName, known: &ContentName) -> bool {
    let (base, known_version) = match split_version(known) {
        Some((base, tag)) => (base, Some(tag)),
        None => (known.clone(), None),
    };
    if !base.is_prefix_of(candidate) {
        return false;
    }
    let candidate_version = match candidate
        .component(base.len())
        .and_then(|c| VersionTag::from_component(c).ok())
    {
        Some(v) => v,
        None => return false,
    };
    known_version.map_or(true, |k| candidate_version > k)
}

/// Whether `name` is `…/<version>/<first segment>`.
pub fn is_versioned_first_segment(name: &ContentName) -> bool {
    segment_number(name) == Some(FIRST_SEGMENT) && has_terminal_version(name)
}

/// Position just past the version component in a fragment answering `interest`.
///
/// Responses to version queries carry the version immediately after the
/// interest prefix, so this is where a candidate name is cut to recover its
/// versioned name.
pub fn version_cut_point(interest: &Interest) -> usize {
    interest.name.len() + 1
}

/// The versioned name of `candidate`, cut at the point `interest` implies.
///
/// Returns `None` if the component at that position is not a version.
pub fn versioned_name_for(candidate: &ContentName, interest: &Interest) -> Option<ContentName> {
    let cut = version_cut_point(interest);
    let version_component = candidate.component(cut - 1)?;
    if !VersionTag::is_version_component(version_component) {
        return None;
    }
    Some(candidate.cut(cut))
}

/// Exact query for the first segment of a specific version.
pub fn first_segment_interest(
    versioned: &ContentName,
    publisher: Option<PublisherDigest>,
) -> Interest {
    Interest::exact(first_segment_name(versioned)).with_publisher(publisher)
}

/// Query for the first fragment of the earliest version strictly after
/// `known`, or of the earliest version at all if `known` is unversioned.
pub fn first_fragment_query_for_next_version(
    known: &ContentName,
    publisher: Option<PublisherDigest>,
) -> Interest {
    let (base, exclude) = match split_version(known) {
        Some((base, tag)) => (base, Exclude::through(tag.to_component())),
        None => (known.clone(), Exclude::new()),
    };
    Interest::new(base)
        .with_exclude(exclude)
        .with_publisher(publisher)
        .with_child_selector(ChildSelector::Leftmost)
        .with_suffix_components(Some(VERSIONED_SUFFIX), Some(VERSIONED_SUFFIX))
}

/// Query for the first fragment of the latest version under `base`.
pub fn latest_version_interest(base: &ContentName, publisher: Option<PublisherDigest>) -> Interest {
    Interest::new(base_name(base))
        .with_publisher(publisher)
        .with_child_selector(ChildSelector::Rightmost)
        .with_suffix_components(Some(VERSIONED_SUFFIX), Some(VERSIONED_SUFFIX))
}
