//! Read access to the shared template workouts under `templates/`.

use crate::store::{decode, encode, validate_key, DocPath, DocumentStore};
use crate::{Error, Result, Workout};

pub struct TemplateStore<'s, S: DocumentStore> {
    store: &'s S,
}

impl<'s, S: DocumentStore> TemplateStore<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    fn root() -> DocPath {
        DocPath::root().child("templates")
    }

    /// Look up a template by name
    pub fn fetch(&self, name: &str) -> Result<Workout> {
        validate_key(name).map_err(|_| Error::TemplateNotFound(name.to_string()))?;
        let path = Self::root().child(name);
        match self.store.read(&path)? {
            Some(value) => decode(&path, value),
            None => {
                tracing::debug!("No template named {:?}", name);
                Err(Error::TemplateNotFound(name.to_string()))
            }
        }
    }

    /// Template names in key order
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .children(&Self::root())?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// All templates in key order
    pub fn list(&self) -> Result<Vec<(String, Workout)>> {
        let root = Self::root();
        self.store
            .children(&root)?
            .into_iter()
            .map(|(key, value)| {
                let workout = decode(&root.child(key.as_str()), value)?;
                Ok((key, workout))
            })
            .collect()
    }

    /// Store each template whose name is not taken yet.
    ///
    /// Returns how many were written. Existing templates are left alone.
    pub fn seed(&self, templates: &[Workout]) -> Result<usize> {
        let root = Self::root();
        let mut encoded = Vec::with_capacity(templates.len());
        for template in templates {
            validate_key(&template.title)?;
            let path = root.child(template.title.as_str());
            encoded.push((path.clone(), encode(&path, template)?));
        }

        let written = self.store.transact(move |tree| {
            let mut written = 0;
            for (path, value) in encoded {
                if !tree.contains(&path) {
                    tree.set(&path, value)?;
                    written += 1;
                }
            }
            Ok(written)
        })?;

        if written > 0 {
            tracing::info!("Seeded {} templates", written);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Exercise;

    fn template(name: &str, count: usize) -> Workout {
        Workout::new(
            name,
            (0..count)
                .map(|i| Exercise::new(format!("ex{}", i), format!("Exercise {}", i)))
                .collect(),
        )
    }

    #[test]
    fn test_fetch_existing_template() {
        let store = MemoryStore::new();
        let templates = TemplateStore::new(&store);
        templates.seed(&[template("5x5", 5)]).unwrap();

        let fetched = templates.fetch("5x5").unwrap();
        assert_eq!(fetched, template("5x5", 5));
    }

    #[test]
    fn test_fetch_unknown_template() {
        let store = MemoryStore::new();
        let templates = TemplateStore::new(&store);

        assert!(matches!(
            templates.fetch("Nope"),
            Err(Error::TemplateNotFound(name)) if name == "Nope"
        ));
        assert!(matches!(
            templates.fetch("bad.name"),
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_seed_only_writes_missing() {
        let store = MemoryStore::new();
        let templates = TemplateStore::new(&store);

        assert_eq!(templates.seed(&[template("5x5", 5)]).unwrap(), 1);
        let written = templates
            .seed(&[template("5x5", 2), template("Upper Body", 3)])
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(templates.fetch("5x5").unwrap().len(), 5);
        assert_eq!(templates.names().unwrap(), vec!["5x5", "Upper Body"]);
        assert_eq!(templates.list().unwrap().len(), 2);
    }
}
