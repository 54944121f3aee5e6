//! Oldest-wins tie-break for space acquisition.
//!
//! When several clients race to create a space with the same name, more than
//! one space may exist briefly. Every client applies the same rule to the
//! listing it sees, so they all converge on the same space: the one with the
//! smallest `(created_at, id)`.

use spacesync_types::SpaceHandle;

/// Select the oldest space whose name matches exactly.
///
/// Equal creation timestamps are broken by id so the choice stays
/// deterministic. Returns `None` if no space carries the name.
pub fn select_oldest<'a, I>(spaces: I, name: &str) -> Option<SpaceHandle>
where
    I: IntoIterator<Item = &'a SpaceHandle>,
{
    spaces
        .into_iter()
        .filter(|space| space.name == name)
        .min_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
        .cloned()
}
