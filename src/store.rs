//! Keyed table storage over sled trees
use std::marker::PhantomData;

use super::error::WorkflowError;

/// One keyed table of cbor-encoded values. Entities, pending changes and
/// approved changes each get their own tree per entity kind; there are no
/// transactions or compare-and-swap on top of what single tree calls give.
pub struct Table<T> {
    tree: sled::Tree,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Table<T>
where
    T: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
{
    pub fn open(db: &sled::Db, name: &str) -> Result<Self, WorkflowError> {
        let tree = db.open_tree(name)?;
        Ok(Self {
            tree,
            _marker: PhantomData,
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<T>, WorkflowError> {
        match self.tree.get(id.as_bytes())? {
            Some(raw) => {
                let value = minicbor::decode(raw.as_ref())
                    .map_err(|e| WorkflowError::Codec(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn set(&self, id: &str, value: &T) -> Result<(), WorkflowError> {
        let raw = minicbor::to_vec(value).map_err(|e| WorkflowError::Codec(e.to_string()))?;
        self.tree.insert(id.as_bytes(), raw)?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), WorkflowError> {
        self.tree.remove(id.as_bytes())?;
        Ok(())
    }

    /// full scan, callers filter in memory
    pub fn list_all(&self) -> Result<Vec<T>, WorkflowError> {
        let mut items = Vec::new();
        for entry in self.tree.iter() {
            let (_, raw) = entry?;
            let value =
                minicbor::decode(raw.as_ref()).map_err(|e| WorkflowError::Codec(e.to_string()))?;
            items.push(value);
        }
        Ok(items)
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }
}
