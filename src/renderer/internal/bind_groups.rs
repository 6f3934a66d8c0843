use std::collections::HashMap;

/// Texture group of one program for one combination of bound texture ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct BindGroupKey {
    pub(crate) program: usize,
    pub(crate) textures: Vec<u32>,
}

/// Bind groups reused across draws and frames while the same textures stay bound.
#[derive(Debug)]
pub(crate) struct BindGroupCache<G> {
    groups: HashMap<BindGroupKey, G>,
}

impl<G> Default for BindGroupCache<G> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

impl<G: Clone> BindGroupCache<G> {
    pub(crate) fn get_or_create(&mut self, key: BindGroupKey, create: impl FnOnce() -> G) -> G {
        self.groups.entry(key).or_insert_with(create).clone()
    }

    pub(crate) fn evict_program(&mut self, slot: usize) {
        self.groups.retain(|key, _| key.program != slot);
    }

    pub(crate) fn evict_textures(&mut self, ids: &[u32]) {
        self.groups
            .retain(|key, _| !key.textures.iter().any(|id| ids.contains(id)));
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }
}
