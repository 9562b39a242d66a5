use ember_rlp::{Decode, Decoder, DecoderError, RlpError, RlpItem};

/// Sequential reader over the items of a decoded RLP list.
pub(crate) struct ListReader {
    items: Vec<RlpItem>,
    position: usize,
}

impl ListReader {
    pub(crate) fn new(decoder: &mut Decoder) -> Result<Self, RlpError> {
        let item = decoder.decode_item()?;
        let items = item
            .as_list()
            .ok_or_else(|| DecoderError::InvalidData("Expected list".to_string()))?
            .to_vec();

        Ok(ListReader { items, position: 0 })
    }

    pub(crate) fn from_item(item: &RlpItem) -> Result<Self, RlpError> {
        let items = item
            .as_list()
            .ok_or_else(|| DecoderError::InvalidData("Expected list".to_string()))?
            .to_vec();

        Ok(ListReader { items, position: 0 })
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.position >= self.items.len()
    }

    pub(crate) fn next_item(&mut self) -> Result<&RlpItem, RlpError> {
        let item = self
            .items
            .get(self.position)
            .ok_or(DecoderError::UnexpectedEof)?;
        self.position += 1;
        Ok(item)
    }

    pub(crate) fn next<T: Decode>(&mut self) -> Result<T, RlpError> {
        let bytes = self.next_item()?.to_vec();
        let mut decoder = Decoder::new(&bytes)?;
        T::decode(&mut decoder)
    }
}
