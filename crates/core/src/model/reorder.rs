use super::Screen;
use crate::Error;

/// Move `screen_id` to `new_position` and renumber `sort_order` as 0..n.
///
/// The input is read in rotation order (`sort_order`, then `id`); the result
/// is a new list, the input is left untouched. `new_position` past the end is
/// clamped to the last slot.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `screen_id` is not in the list.
pub fn reorder_screens(screens: &[Screen], screen_id: i64, new_position: usize) -> Result<Vec<Screen>, Error> {
    let mut ordered: Vec<Screen> = screens.to_vec();
    ordered.sort_by_key(Screen::rotation_key);

    let from = ordered
        .iter()
        .position(|s| s.id == screen_id)
        .ok_or_else(|| Error::InvalidInput(format!("screen {screen_id} not found")))?;

    let moved = ordered.remove(from);
    let to = new_position.min(ordered.len());
    ordered.insert(to, moved);

    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(index, screen)| Screen { sort_order: index as i32, ..screen })
        .collect())
}
