//! Room codes: six uppercase alphanumerics.

use rand::Rng;

pub const ROOM_ID_LEN: usize = 6;

pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'A' + idx - 10) as char
            }
        })
        .collect()
}

pub fn is_valid_room_id(id: &str) -> bool {
    id.len() == ROOM_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}
