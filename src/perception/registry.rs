use crate::perception::types::Element;

/// Elements of the most recent perception cycle, addressable by id.
///
/// Replaced wholesale on every successful capture; never merged.
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    elements: Vec<Element>,
}

impl ElementRegistry {
    /// `elements` must carry ids `1..=N` in order, as produced by the tree walk.
    pub fn new(elements: Vec<Element>) -> Self {
        debug_assert!(elements.iter().enumerate().all(|(i, e)| e.id as usize == i + 1));
        Self { elements }
    }

    pub fn get(&self, id: u32) -> Option<&Element> {
        let idx = (id as usize).checked_sub(1)?;
        self.elements.get(idx).filter(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }
}
