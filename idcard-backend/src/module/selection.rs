///! Active member selection

use super::member::{Directory, MemberRecord};

/// Index of the member currently shown, or none for an empty directory.
///
/// The directory never shrinks, so a stored index stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    active: Option<usize>,
}

impl Selection {
    /// First member, or nothing when the directory is empty
    pub fn initial(directory: &Directory) -> Self {
        Self {
            active: if directory.is_empty() { None } else { Some(0) },
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active<'a>(&self, directory: &'a Directory) -> Option<&'a MemberRecord> {
        self.active.and_then(|i| directory.get(i))
    }

    /// Activate the member at `index`. Out of range leaves the state untouched.
    pub fn select(&mut self, directory: &Directory, index: usize) -> bool {
        if index < directory.len() {
            self.active = Some(index);
            true
        } else {
            tracing::debug!("Ignoring selection of index {} (directory has {})", index, directory.len());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::member::MemberRecord;

    fn directory(names: &[&str]) -> Directory {
        Directory::new(
            names
                .iter()
                .map(|n| MemberRecord {
                    display_name: n.to_string(),
                    reading: String::new(),
                    accent_color: String::new(),
                    cohort: String::new(),
                    region: String::new(),
                    image_file_name: String::new(),
                    ability_text: String::new(),
                    team: false,
                })
                .collect(),
        )
    }

    #[test]
    fn test_initial_selection() {
        let dir = directory(&["a", "b"]);
        assert_eq!(Selection::initial(&dir).active_index(), Some(0));
        assert!(Selection::initial(&directory(&[])).active(&directory(&[])).is_none());
    }

    #[test]
    fn test_select() {
        let dir = directory(&["a", "b", "c"]);
        let mut sel = Selection::initial(&dir);
        assert!(sel.select(&dir, 2));
        assert_eq!(sel.active(&dir).unwrap().display_name, "c");

        assert!(!sel.select(&dir, 3));
        assert_eq!(sel.active_index(), Some(2));
    }
}
