//! Click debouncing for submenu-root items
//!
//! A popup item that owns a submenu never fires a command of its own; the
//! window system only reports loosely-correlated hover and idle notifications
//! while the menu's modal loop runs. This state machine watches those two
//! streams and decides when a press-and-release on the same VM item was a
//! deliberate click (which should connect to that VM) versus an incidental
//! hover, drag, or double-click.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ItemRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Watching,
    ButtonDown,
    Cancelled,
}

/// Exists only while one context menu is open.
#[derive(Debug)]
pub struct MenuInteraction {
    state: InteractionState,
    /// Most recently hovered submenu-root item and its screen rectangle.
    candidate: Option<(usize, ItemRect)>,
    /// Item the left button went down on.
    down_index: Option<usize>,
}

impl MenuInteraction {
    pub fn new() -> Self {
        Self {
            state: InteractionState::Watching,
            candidate: None,
            down_index: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// A submenu-root item was highlighted.
    pub fn on_hover(&mut self, index: usize, rect: ItemRect) {
        self.candidate = Some((index, rect));
    }

    /// Idle poll with the current cursor position and left-button state.
    ///
    /// Returns the item index when a deliberate press-and-release completed;
    /// the caller should connect to that VM and cancel the menu loop.
    pub fn on_idle(&mut self, x: i32, y: i32, button_down: bool) -> Option<usize> {
        let candidate_index = self.candidate.map(|(index, _)| index);
        let inside = self
            .candidate
            .map_or(false, |(_, rect)| rect.contains(x, y));

        if button_down {
            if self.state == InteractionState::Cancelled
                || (self.state == InteractionState::ButtonDown
                    && self.down_index != candidate_index)
                || !inside
            {
                self.cancel();
            } else {
                self.state = InteractionState::ButtonDown;
                self.down_index = candidate_index;
            }
            return None;
        }

        if !inside {
            self.state = InteractionState::Watching;
            self.down_index = None;
            return None;
        }

        if self.state == InteractionState::ButtonDown && self.down_index == candidate_index {
            // A true press-and-release on the same item.
            self.state = InteractionState::Cancelled;
            return self.down_index.take();
        }

        None
    }

    fn cancel(&mut self) {
        self.state = InteractionState::Cancelled;
        self.candidate = None;
        self.down_index = None;
    }
}

impl Default for MenuInteraction {
    fn default() -> Self {
        Self::new()
    }
}
