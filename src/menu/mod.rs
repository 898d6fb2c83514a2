//! Menu selection state machine
//!
//! Pure logic over the item list and the highlighted index. Input handling
//! translates keysyms into [`MenuKey`]s and the session interprets the
//! returned [`MenuAction`]; nothing in here touches protocol objects.

use std::io::{self, BufRead};

use crate::error::{Result, RingError};

/// Keys the menu reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKey {
    Down,
    Up,
    Confirm,
    Cancel,
    Other,
}

/// What the caller has to do after a key was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Nothing changed
    None,
    /// The highlight moved and the surface must be repainted
    Redraw,
    /// Emit the item at this index and quit
    Select(usize),
    /// Quit without emitting anything
    Quit,
}

/// Advance the selection by one key.
///
/// Movement stops at both ends of the list instead of wrapping around.
pub fn step(index: usize, count: usize, key: MenuKey) -> (usize, MenuAction) {
    match key {
        MenuKey::Down if index + 1 < count => (index + 1, MenuAction::Redraw),
        MenuKey::Up if index > 0 && count > 0 => (index - 1, MenuAction::Redraw),
        MenuKey::Confirm if index < count => (index, MenuAction::Select(index)),
        MenuKey::Cancel => (index, MenuAction::Quit),
        _ => (index, MenuAction::None),
    }
}

/// The items on screen and the current highlight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    items: Vec<String>,
    selected: usize,
}

impl MenuState {
    /// Build the menu; an empty list has nothing to choose from.
    pub fn new(items: Vec<String>) -> Result<Self> {
        if items.is_empty() {
            return Err(RingError::EmptyMenu);
        }
        Ok(Self { items, selected: 0 })
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_item(&self) -> &str {
        &self.items[self.selected]
    }

    pub fn apply(&mut self, key: MenuKey) -> MenuAction {
        let (index, action) = step(self.selected, self.items.len(), key);
        self.selected = index;
        action
    }
}

/// Read one menu item per line. The trailing newline (and a carriage
/// return before it) is stripped; invalid UTF-8 is replaced.
pub fn read_items<R: BufRead>(mut reader: R) -> io::Result<Vec<String>> {
    let mut items = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        items.push(String::from_utf8_lossy(&line).into_owned());
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu(items: &[&str]) -> MenuState {
        MenuState::new(items.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_down_down_down_up_visits_expected_indices() {
        let mut state = menu(&["a", "b", "c"]);
        let visited: Vec<usize> = [MenuKey::Down, MenuKey::Down, MenuKey::Down, MenuKey::Up]
            .into_iter()
            .map(|key| {
                state.apply(key);
                state.selected()
            })
            .collect();
        assert_eq!(visited, vec![1, 2, 2, 1]);
    }

    #[test]
    fn test_movement_past_the_ends_is_a_noop() {
        assert_eq!(step(0, 3, MenuKey::Up), (0, MenuAction::None));
        assert_eq!(step(2, 3, MenuKey::Down), (2, MenuAction::None));
        assert_eq!(step(0, 1, MenuKey::Down), (0, MenuAction::None));
    }

    #[test]
    fn test_confirm_selects_current_item() {
        let mut state = menu(&["first", "second"]);
        state.apply(MenuKey::Down);
        assert_eq!(state.apply(MenuKey::Confirm), MenuAction::Select(1));
        assert_eq!(state.selected_item(), "second");
    }

    #[test]
    fn test_cancel_quits_from_any_index() {
        for start in 0..3 {
            assert_eq!(step(start, 3, MenuKey::Cancel), (start, MenuAction::Quit));
        }
    }

    #[test]
    fn test_other_keys_do_nothing() {
        let mut state = menu(&["a", "b"]);
        assert_eq!(state.apply(MenuKey::Other), MenuAction::None);
        assert_eq!(state.selected(), 0);
    }

    #[test]
    fn test_empty_menu_is_rejected() {
        assert!(matches!(MenuState::new(Vec::new()), Err(RingError::EmptyMenu)));
    }

    #[test]
    fn test_read_items_strips_line_endings() {
        let input = b"alpha\nbeta\r\n\ngamma".as_slice();
        let items = read_items(input).unwrap();
        assert_eq!(items, vec!["alpha", "beta", "", "gamma"]);
    }

    #[test]
    fn test_read_items_keeps_pipes_verbatim() {
        let items = read_items(b"a|b|c\n".as_slice()).unwrap();
        assert_eq!(items, vec!["a|b|c"]);
    }

    #[test]
    fn test_read_items_replaces_invalid_utf8() {
        let items = read_items(b"ok\n\xff\xfe\n".as_slice()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], "ok");
        assert!(items[1].contains('\u{fffd}'));
    }

    #[test]
    fn test_read_items_from_empty_input() {
        assert!(read_items(b"".as_slice()).unwrap().is_empty());
    }
}
