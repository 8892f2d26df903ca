use crate::backend::{Volume, VolumeSystem};
use crate::error::ScanError;

/// Prefixes of canonical volume identifiers.
pub const IDENTIFIER_PREFIXES: [&str; 3] = ["apfs", "p", "vss"];

/// Canonical identifier for a 1-based volume index.
pub fn identifier_for_index(prefix: &str, index: u64) -> String {
    format!("{}{}", prefix, index)
}

/// Whether `identifier` is `<prefix><digits>` for one of the known prefixes.
pub fn is_normalized(identifier: &str) -> bool {
    IDENTIFIER_PREFIXES.iter().any(|prefix| {
        identifier
            .strip_prefix(prefix)
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Rewrite a bare numeral to `<prefix><index>`. Normalized identifiers,
/// and anything that is not a numeral, pass through unchanged.
pub fn normalize_identifier(identifier: &str, prefix: &str) -> String {
    if is_normalized(identifier) {
        return identifier.to_string();
    }
    match identifier.trim().parse::<u64>() {
        Ok(index) => identifier_for_index(prefix, index),
        Err(_) => identifier.to_string(),
    }
}

/// Volume named by `identifier`, whether the volume system reports it as a
/// bare numeral or with its prefix.
pub fn find_volume(volume_system: &dyn VolumeSystem, identifier: &str, prefix: &str) -> Option<Volume> {
    let normalized = normalize_identifier(identifier, prefix);
    let bare = normalized
        .strip_prefix(prefix)
        .filter(|_| !prefix.is_empty() && is_normalized(&normalized));
    let found = [identifier, normalized.as_str()]
        .into_iter()
        .chain(bare)
        .find_map(|candidate| volume_system.volume_by_identifier(candidate));
    found
}

/// Normalize and validate identifiers against the volume system that owns
/// them. Fails on the first identifier with no matching volume.
pub fn normalize_volume_identifiers<S: AsRef<str>>(
    volume_system: &dyn VolumeSystem,
    identifiers: &[S],
    prefix: &str,
) -> Result<Vec<String>, ScanError> {
    let mut normalized = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let identifier = identifier.as_ref();
        let canonical = normalize_identifier(identifier, prefix);
        if find_volume(volume_system, identifier, prefix).is_none() {
            return Err(ScanError::VolumeMissing(canonical));
        }
        normalized.push(canonical);
    }
    Ok(normalized)
}

/// Location of a volume's node beneath its volume system root.
pub fn volume_location(identifier: &str) -> String {
    format!("/{}", identifier)
}
