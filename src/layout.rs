/// Narrower terminals show one panel at a time.
pub const PAIRED_MIN_WIDTH: u16 = 70;
pub const MIN_LIST_WIDTH: u16 = 30;
pub const MIN_DETAIL_WIDTH: u16 = 35;
pub const MAX_LIST_WIDTH: u16 = 55;
pub const MIN_SINGLE_WIDTH: u16 = 20;
const MIN_HEIGHT: u16 = 10;
const MIN_CONTENT_HEIGHT: u16 = 5;
/// Header, help bar and outer padding.
const CHROME_HEIGHT: u16 = 6;
/// Gap and borders between the two panels.
const PANEL_GUTTER: u16 = 5;
/// Borders plus the panel title rows.
const PANEL_CHROME: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Paired,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelLayout {
    pub mode: LayoutMode,
    pub list_width: u16,
    pub detail_width: u16,
    pub content_height: u16,
}

impl PanelLayout {
    pub fn compute(width: u16, height: u16) -> Self {
        let content_height = height
            .max(MIN_HEIGHT)
            .saturating_sub(CHROME_HEIGHT)
            .max(MIN_CONTENT_HEIGHT);

        if width < PAIRED_MIN_WIDTH {
            let panel = width.saturating_sub(4).max(MIN_SINGLE_WIDTH);
            return Self {
                mode: LayoutMode::Single,
                list_width: panel,
                detail_width: panel,
                content_height,
            };
        }

        // Wider terminals hand proportionally less to the list.
        let share = if width < 100 {
            40
        } else if width < 140 {
            35
        } else {
            30
        };
        let mut list_width = (u32::from(width) * share / 100) as u16;
        if width >= 140 {
            list_width = list_width.min(MAX_LIST_WIDTH);
        }
        let list_width = list_width.max(MIN_LIST_WIDTH);
        let detail_width = width
            .saturating_sub(list_width)
            .saturating_sub(PANEL_GUTTER)
            .max(MIN_DETAIL_WIDTH);

        Self {
            mode: LayoutMode::Paired,
            list_width,
            detail_width,
            content_height,
        }
    }

    pub fn is_single(&self) -> bool {
        self.mode == LayoutMode::Single
    }

    /// Rows available to list/detail content inside a panel.
    pub fn viewport_height(&self) -> u16 {
        self.content_height.saturating_sub(PANEL_CHROME).max(1)
    }

    pub fn list_viewport_width(&self) -> u16 {
        self.list_width.saturating_sub(PANEL_CHROME).max(10)
    }

    pub fn detail_viewport_width(&self) -> u16 {
        self.detail_width.saturating_sub(PANEL_CHROME).max(10)
    }
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self::compute(PAIRED_MIN_WIDTH, 24)
    }
}
