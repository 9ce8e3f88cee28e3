use sha3::{Digest, Sha3_256};

use crate::error::SymbolError;

const NAMESPACE_FLAG: u64 = 1 << 63;
const MAX_PART_LENGTH: usize = 64;

/// Namespace ids always carry the high bit; mosaic ids never do.
pub fn is_namespace_id(id: u64) -> bool {
    id & NAMESPACE_FLAG != 0
}

/// Id of a single namespace level under `parent_id` (0 for root).
pub fn generate_namespace_id(name: &str, parent_id: u64) -> u64 {
    let mut hasher = Sha3_256::new();
    hasher.update(parent_id.to_le_bytes());
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(id) | NAMESPACE_FLAG
}

/// Resolves a dotted name (e.g. `symbol.xym`) to the id of its last level.
pub fn namespace_id_from_name(full_name: &str) -> Result<u64, SymbolError> {
    let path = namespace_path(full_name)?;
    // namespace_path never returns an empty path.
    Ok(path[path.len() - 1])
}

/// Ids of every level in a dotted name, root first.
pub fn namespace_path(full_name: &str) -> Result<Vec<u64>, SymbolError> {
    let parts: Vec<&str> = full_name.split('.').collect();
    if parts.len() > 3 {
        return Err(SymbolError::InvalidAddress(format!(
            "namespace '{full_name}' has too many levels"
        )));
    }

    let mut path = Vec::with_capacity(parts.len());
    let mut parent = 0u64;
    for part in parts {
        if !is_valid_part(part) {
            return Err(SymbolError::InvalidAddress(format!(
                "invalid namespace part '{part}'"
            )));
        }
        parent = generate_namespace_id(part, parent);
        path.push(parent);
    }
    Ok(path)
}

fn is_valid_part(part: &str) -> bool {
    let mut chars = part.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    part.len() <= MAX_PART_LENGTH
        && (first.is_ascii_lowercase() || first.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
