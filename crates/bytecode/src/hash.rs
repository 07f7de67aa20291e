//! FNV-1a hashing for optimizer cache keys
//!
//! Reflection optimizers are cached per (class, accessor list). The key packs
//! a 32-bit class hash and a 32-bit hash of the accessor signature into one
//! `u64`.

const FNV32_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV32_PRIME: u32 = 0x01000193;

/// FNV-1a 32-bit hash (compile-time capable)
pub const fn fnv1a_32(data: &[u8]) -> u32 {
    fnv1a_32_extend(FNV32_OFFSET_BASIS, data)
}

/// Continue an FNV-1a 32-bit hash over more bytes
pub const fn fnv1a_32_extend(mut hash: u32, data: &[u8]) -> u32 {
    let mut i = 0;
    while i < data.len() {
        hash ^= data[i] as u32;
        hash = hash.wrapping_mul(FNV32_PRIME);
        i += 1;
    }
    hash
}

/// Combined class + signature hash for cache keys
pub const fn combined_hash(class_name: &[u8], signature: u32) -> u64 {
    let class_hash = fnv1a_32(class_name);
    ((class_hash as u64) << 32) | (signature as u64)
}

/// Hash an ordered list of names
///
/// Each name is followed by a separator byte so `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
pub fn list_hash<'a>(hash: u32, names: impl IntoIterator<Item = &'a str>) -> u32 {
    names.into_iter().fold(hash, |h, name| {
        fnv1a_32_extend(fnv1a_32_extend(h, name.as_bytes()), &[0x1f])
    })
}

/// Cache key for a reflection optimizer
pub fn accessor_key(class_name: &str, getters: &[&str], setters: &[&str], types: &[String]) -> u64 {
    let mut signature = list_hash(FNV32_OFFSET_BASIS, getters.iter().copied());
    signature = fnv1a_32_extend(signature, &[0x1e]);
    signature = list_hash(signature, setters.iter().copied());
    signature = fnv1a_32_extend(signature, &[0x1e]);
    signature = list_hash(signature, types.iter().map(String::as_str));
    combined_hash(class_name.as_bytes(), signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_32_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn test_list_hash_separates_names() {
        let a = list_hash(0x811c9dc5, ["ab", "c"]);
        let b = list_hash(0x811c9dc5, ["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_accessor_key_depends_on_order() {
        let types = vec!["integer".to_string(), "text".to_string()];
        let k1 = accessor_key("Person", &["id", "name"], &["set_id", "set_name"], &types);
        let k2 = accessor_key("Person", &["name", "id"], &["set_name", "set_id"], &types);
        let k3 = accessor_key("Company", &["id", "name"], &["set_id", "set_name"], &types);
        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(
            k1,
            accessor_key("Person", &["id", "name"], &["set_id", "set_name"], &types)
        );
    }

    #[test]
    fn test_const_evaluation() {
        const HASH: u32 = fnv1a_32(b"Person");
        const KEY: u64 = combined_hash(b"Person", 7);
        assert_eq!((KEY >> 32) as u32, HASH);
    }
}
