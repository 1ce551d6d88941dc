use specsync_types::change::Classification;
use specsync_types::version::{Bump, Version, VersionOrdering};

/// Next version for a resource.
///
/// An explicit bump always wins. Otherwise the aggregate classification
/// picks the component: breaking bumps major, non-breaking bumps minor,
/// informational bumps patch. A resource with no versions starts at
/// [`Version::INITIAL`]; an explicit minor or patch bump applies to `0.0.0`.
pub fn next_version(
    current: Option<&Version>,
    aggregate: Classification,
    explicit: Option<Bump>,
) -> Version {
    match (current, explicit) {
        (None, None) | (None, Some(Bump::Major)) => Version::INITIAL,
        (None, Some(bump)) => Version::new(0, 0, 0).bump(bump),
        (Some(v), Some(bump)) => v.bump(bump),
        (Some(v), None) => v.bump(Bump::for_classification(aggregate)),
    }
}

pub fn compare(a: &Version, b: &Version) -> VersionOrdering {
    a.cmp(b).into()
}
