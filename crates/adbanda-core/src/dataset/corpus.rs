//! Precomputed embeddings for every raw class of a dataset root

use std::ops::Index;
use std::path::Path;

use crate::config::{ModelKind, RawClass};
use crate::embedding::Embedding;
use crate::error::Result;

use super::cache::{cache_path, load_embeddings_or_empty};
use super::LabeledSet;

/// Embeddings loaded from the three raw class caches
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCorpus {
    pub adverts: Vec<Embedding>,
    pub music: Vec<Embedding>,
    pub talk: Vec<Embedding>,
}

impl EmbeddingCorpus {
    /// Load `<root>/{advert,music,talk}.embeddings`; missing caches are empty
    pub fn load(root: &Path) -> Result<Self> {
        Ok(Self {
            adverts: load_embeddings_or_empty(&cache_path(root, RawClass::Advert))?,
            music: load_embeddings_or_empty(&cache_path(root, RawClass::Music))?,
            talk: load_embeddings_or_empty(&cache_path(root, RawClass::Talk))?,
        })
    }

    pub fn class(&self, class: RawClass) -> &[Embedding] {
        match class {
            RawClass::Advert => &self.adverts,
            RawClass::Music => &self.music,
            RawClass::Talk => &self.talk,
        }
    }

    /// Label every embedding according to a grouping, concatenating merged
    /// raw classes in grouping order. Classes the grouping leaves out are
    /// dropped.
    pub fn combine(mut self, kind: ModelKind) -> LabeledSet<Embedding> {
        let groups = kind
            .groups()
            .into_iter()
            .map(|raw_classes| {
                raw_classes
                    .into_iter()
                    .flat_map(|class| self.take_class(class))
                    .collect()
            })
            .collect();
        LabeledSet::from_groups(groups)
    }

    fn take_class(&mut self, class: RawClass) -> Vec<Embedding> {
        match class {
            RawClass::Advert => std::mem::take(&mut self.adverts),
            RawClass::Music => std::mem::take(&mut self.music),
            RawClass::Talk => std::mem::take(&mut self.talk),
        }
    }
}

impl Index<&str> for EmbeddingCorpus {
    type Output = [Embedding];

    /// # Panics
    /// On a name that is not a raw class directory.
    fn index(&self, name: &str) -> &Self::Output {
        match RawClass::from_name(name) {
            Some(class) => self.class(class),
            None => panic!("Unknown class name: {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::cache::save_embeddings;
    use crate::embedding::EMBEDDING_DIM;

    fn frames(n: usize, value: f32) -> Vec<Embedding> {
        vec![vec![value; EMBEDDING_DIM]; n]
    }

    #[test]
    fn test_combine_at_ignores_music() {
        let corpus = EmbeddingCorpus {
            adverts: frames(3, 0.0),
            music: frames(7, 1.0),
            talk: frames(2, 2.0),
        };
        let set = corpus.combine(ModelKind::At);
        assert_eq!(set.len(), 5);
        assert_eq!(set.class_counts(), vec![3, 2]);
        assert!(set.iter().all(|(e, label)| e[0] == 2.0 * *label as f32));
    }

    #[test]
    fn test_combine_ao_merges_music_and_talk() {
        let corpus = EmbeddingCorpus {
            adverts: frames(3, 0.0),
            music: frames(7, 1.0),
            talk: frames(2, 2.0),
        };
        let set = corpus.combine(ModelKind::Ao);
        assert_eq!(set.class_counts(), vec![3, 9]);
    }

    #[test]
    fn test_empty_class_contributes_nothing() {
        let corpus = EmbeddingCorpus {
            adverts: Vec::new(),
            music: frames(4, 1.0),
            talk: Vec::new(),
        };
        let set = corpus.combine(ModelKind::Mo);
        assert_eq!(set.len(), 4);
        assert!(set.labels().all(|l| l == 0));
    }

    #[test]
    fn test_load_from_root() {
        let root = tempfile::tempdir().unwrap();
        save_embeddings(&cache_path(root.path(), RawClass::Talk), &frames(2, 0.1)).unwrap();

        let corpus = EmbeddingCorpus::load(root.path()).unwrap();
        assert!(corpus.adverts.is_empty());
        assert_eq!(corpus["talk"].len(), 2);
    }

    #[test]
    #[should_panic(expected = "Unknown class name")]
    fn test_unknown_name_panics() {
        let corpus = EmbeddingCorpus::default();
        let _ = &corpus["jingles"];
    }
}
