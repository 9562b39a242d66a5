use crate::traits::Encode;
use bytes::BytesMut;

pub struct Encoder {
    buffer: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            buffer: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Encoder {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        match bytes.len() {
            0 => self.buffer.extend_from_slice(&[0x80]),
            1 if bytes[0] < 0x80 => self.buffer.extend_from_slice(bytes),
            len if len < 56 => {
                self.buffer.extend_from_slice(&[0x80 + len as u8]);
                self.buffer.extend_from_slice(bytes);
            }
            len => {
                let len_bytes = encode_length(len);
                self.buffer.extend_from_slice(&[0xb7 + len_bytes.len() as u8]);
                self.buffer.extend_from_slice(&len_bytes);
                self.buffer.extend_from_slice(bytes);
            }
        }
    }

    /// Append pre-encoded RLP verbatim. The payload must itself be a
    /// well-formed item; used to embed nested nodes and raw list items.
    pub fn append_raw(&mut self, encoded: &[u8]) {
        self.buffer.extend_from_slice(encoded);
    }

    /// Wrap an already-encoded payload with a list header.
    pub fn wrap_list(&mut self, payload: &[u8]) {
        match payload.len() {
            len if len < 56 => {
                self.buffer.extend_from_slice(&[0xc0 + len as u8]);
            }
            len => {
                let len_bytes = encode_length(len);
                self.buffer.extend_from_slice(&[0xf7 + len_bytes.len() as u8]);
                self.buffer.extend_from_slice(&len_bytes);
            }
        }
        self.buffer.extend_from_slice(payload);
    }

    pub fn encode_list<T: Encode>(&mut self, items: &[T]) {
        self.encode_list_with(|e| {
            for item in items {
                item.encode(e);
            }
        });
    }

    /// Encode a heterogeneous list: the closure writes the items, the
    /// encoder wraps them with the list header.
    pub fn encode_list_with<F: FnOnce(&mut Encoder)>(&mut self, f: F) {
        let mut list_encoder = Encoder::new();
        f(&mut list_encoder);
        let payload = list_encoder.finish();
        self.wrap_list(&payload);
    }

    pub fn encode_u8(&mut self, value: u8) {
        if value == 0 {
            self.encode_bytes(&[]);
        } else {
            self.encode_bytes(&[value]);
        }
    }

    pub fn encode_u16(&mut self, value: u16) {
        self.encode_uint_be(&value.to_be_bytes());
    }

    pub fn encode_u32(&mut self, value: u32) {
        self.encode_uint_be(&value.to_be_bytes());
    }

    pub fn encode_u64(&mut self, value: u64) {
        self.encode_uint_be(&value.to_be_bytes());
    }

    pub fn encode_bool(&mut self, value: bool) {
        self.encode_u8(if value { 1 } else { 0 });
    }

    fn encode_uint_be(&mut self, bytes: &[u8]) {
        match bytes.iter().position(|&b| b != 0) {
            None => self.encode_bytes(&[]),
            Some(first_non_zero) => self.encode_bytes(&bytes[first_non_zero..]),
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    let bytes = (len as u64).to_be_bytes();
    let first_non_zero = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[first_non_zero..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_single_byte() {
        let mut encoder = Encoder::new();
        encoder.encode_bytes(&[0x00]);
        assert_eq!(encoder.finish(), vec![0x00]);

        let mut encoder = Encoder::new();
        encoder.encode_bytes(&[0x7f]);
        assert_eq!(encoder.finish(), vec![0x7f]);
    }

    #[test]
    fn test_encode_string() {
        let mut encoder = Encoder::new();
        encoder.encode_bytes(b"dog");
        assert_eq!(encoder.finish(), vec![0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn test_encode_long_string() {
        let data = vec![0xaa; 60];
        let mut encoder = Encoder::new();
        encoder.encode_bytes(&data);
        let out = encoder.finish();
        assert_eq!(out[0], 0xb8);
        assert_eq!(out[1], 60);
        assert_eq!(&out[2..], &data[..]);
    }

    #[test]
    fn test_encode_list() {
        let mut encoder = Encoder::new();
        encoder.encode_list(&["cat", "dog"]);
        assert_eq!(
            encoder.finish(),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn test_encode_empty() {
        let mut encoder = Encoder::new();
        encoder.encode_bytes(&[]);
        assert_eq!(encoder.finish(), vec![0x80]);
    }

    #[test]
    fn test_encode_empty_list() {
        let mut encoder = Encoder::new();
        encoder.encode_list::<Vec<u8>>(&[]);
        assert_eq!(encoder.finish(), vec![0xc0]);
    }

    #[test]
    fn test_encode_nested_list() {
        // [ [], [[]] ]
        let mut encoder = Encoder::new();
        encoder.encode_list_with(|e| {
            e.encode_list_with(|_| {});
            e.encode_list_with(|e| e.encode_list_with(|_| {}));
        });
        assert_eq!(encoder.finish(), vec![0xc3, 0xc0, 0xc1, 0xc0]);
    }

    #[test]
    fn test_append_raw_equals_inline() {
        let mut inner = Encoder::new();
        inner.encode_bytes(b"cat");
        let raw = inner.finish();

        let mut encoder = Encoder::new();
        encoder.encode_list_with(|e| e.append_raw(&raw));
        assert_eq!(encoder.finish(), vec![0xc4, 0x83, b'c', b'a', b't']);
    }
}
