//! Stable hashes used to identify shortcuts and verify copied files.

/// High bit the Steam client uses to mark an app id as a non-Steam shortcut.
pub const SHORTCUT_ID_FLAG: u32 = 0x8000_0000;

const LAUNCH_ID_TYPE: u64 = 0x0200_0000;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

static CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut index = 0;
    while index < 256 {
        let mut value = index as u32;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 1 != 0 {
                (value >> 1) ^ CRC32_POLYNOMIAL
            } else {
                value >> 1
            };
            bit += 1;
        }
        table[index] = value;
        index += 1;
    }
    table
}

/// FNV-1a over the raw bytes. Not collision resistant against crafted input.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// 16-character lowercase hex rendering of [`fnv1a64`] over the UTF-8 text.
pub fn fingerprint(text: &str) -> String {
    fingerprint_bytes(text.as_bytes())
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:016x}", fnv1a64(bytes))
}

/// Reflected CRC-32 (IEEE), as used by zip and the Steam client.
pub fn crc32(bytes: &[u8]) -> u32 {
    let crc = bytes.iter().fold(0xFFFF_FFFFu32, |crc, byte| {
        let index = ((crc ^ u32::from(*byte)) & 0xFF) as usize;
        (crc >> 8) ^ CRC32_TABLE[index]
    });
    !crc
}

pub fn derive_shortcut_id(exe_path: &str, display_name: &str) -> u32 {
    let mut key = String::with_capacity(exe_path.len() + display_name.len());
    key.push_str(exe_path);
    key.push_str(display_name);
    crc32(key.as_bytes()) | SHORTCUT_ID_FLAG
}

/// 64-bit id accepted by `steam://rungameid/`.
pub fn to_launch_game_id(app_id: u32) -> u64 {
    (u64::from(app_id) << 32) | LAUNCH_ID_TYPE
}

pub fn launch_url(app_id: u32) -> String {
    format!("steam://rungameid/{}", to_launch_game_id(app_id))
}
