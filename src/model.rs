use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, info, trace, warn};

use crate::dataset::{Column, Record};
use crate::domain::{CMDMode, HELP_TEXT, Message, ViewerConfig};
use crate::inputter::{InputResult, Inputter};
use crate::listing::{ALL_CATEGORIES, ListController, SortDirection};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, SORT_MARKER_WIDTH, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT, TITLE_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Record,
    Popup,
    CmdInput,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeaderView {
    pub name: String,
    pub width: usize,
    pub sortable: bool,
    pub sort: Option<SortDirection>,
}

#[derive(Clone, Debug, Default)]
pub struct RecordData {
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub selected: usize,
    pub offset: usize,
}

/// Snapshot of everything the ui renders.
#[derive(Clone, Debug, Default)]
pub struct UIData {
    pub title: String,
    pub headers: Vec<HeaderView>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub caption: String,
    pub has_more: bool,
    pub record: Option<RecordData>,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(width: usize, height: usize) -> Self {
        let table_height = height
            .saturating_sub(TITLE_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT)
            .max(1);
        let layout = UILayout {
            width,
            height,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: ViewerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    title: String,
    columns: Vec<Column>,
    list: ListController,
    categories: Vec<String>,
    category_idx: usize,
    row: usize, // Selected row in the materialized view
    offset_row: usize,
    selected_column: usize,
    offset_column: usize,
    shown: usize, // Rows materialized at the last refresh
    record_idx: usize,
    record_row: usize,
    record_offset: usize,
    layout: UILayout,
    clipboard: Option<Clipboard>,
    input: Inputter,
    query_before_input: String,
    uidata: UIData,
    status_message: String,
}

impl Model {
    pub fn new(
        config: &ViewerConfig,
        title: String,
        columns: Vec<Column>,
        list: ListController,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let mut categories = list.categories();
        let selected = list.state().category.as_str();
        let category_idx = match categories.iter().position(|c| c == selected) {
            Some(idx) => idx,
            None if selected.is_empty() => 0,
            None => {
                // Unknown to the data, still part of the cycle
                warn!("Category \"{selected}\" matches no record");
                categories.push(selected.to_string());
                categories.len() - 1
            }
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::Ready,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            title,
            columns,
            list,
            categories,
            category_idx,
            row: 0,
            offset_row: 0,
            selected_column: 0,
            offset_column: 0,
            shown: 0,
            record_idx: 0,
            record_row: 0,
            record_offset: 0,
            layout: UILayout::from_values(ui_width, ui_height),
            clipboard: None,
            input: Inputter::default(),
            query_before_input: String::new(),
            uidata: UIData::default(),
            status_message: "Press ? for help".to_string(),
        };
        model.refresh();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CmdInput
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) {
        let Some(msg) = message else {
            return;
        };

        match self.modus {
            Modus::Table => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_row(-1),
                Message::MoveDown => self.move_row(1),
                Message::MovePageUp => self.move_row(-(self.layout.table_height as isize)),
                Message::MovePageDown => self.move_row(self.layout.table_height as isize),
                Message::MoveBeginning => self.row = 0,
                Message::MoveEnd => self.row = self.shown.saturating_sub(1),
                Message::MoveLeft => self.selected_column = self.selected_column.saturating_sub(1),
                Message::MoveRight => {
                    if self.selected_column + 1 < self.columns.len() {
                        self.selected_column += 1;
                    }
                }
                Message::Search => self.enter_cmd_mode(CMDMode::Search),
                Message::ToggleSort => self.toggle_sort(),
                Message::ShowMore => self.show_more(),
                Message::NextCategory => self.cycle_category(1),
                Message::PrevCategory => self.cycle_category(-1),
                Message::Enter => self.enter_record_view(),
                Message::Exit => self.clear_query(),
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::RawKey(_) => (),
            },
            Modus::Record => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_record_selection(-1),
                Message::MoveDown => self.move_record_selection(1),
                Message::MovePageUp => self.move_record_selection(-10),
                Message::MovePageDown => self.move_record_selection(10),
                Message::MoveLeft => self.select_record(self.record_idx.saturating_sub(1)),
                Message::MoveRight => self.select_record(self.record_idx + 1),
                Message::CopyCell => self.copy_record_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_help(),
                Message::Exit | Message::Enter => {
                    self.previous_modus = Modus::Record;
                    self.modus = Modus::Table;
                    self.row = self.record_idx;
                }
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Modus::Popup => match msg {
                Message::Quit => self.quit(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                Message::Exit | Message::Enter | Message::Help => {
                    trace!("Close popup ...");
                    self.modus = self.previous_modus;
                    self.previous_modus = Modus::Popup;
                }
                _ => (),
            },
            Modus::CmdInput => match msg {
                Message::RawKey(key) => self.raw_input(key),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }

        self.refresh();
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.layout.width, width, self.layout.height, height
        );
        self.layout = UILayout::from_values(width, height);
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn move_row(&mut self, step: isize) {
        let target = self.row.saturating_add_signed(step);
        let last = self.shown.saturating_sub(1);
        if target > last && step > 0 && self.shown < self.list.match_count() {
            self.set_status_message("Press m to show more");
        }
        self.row = target.min(last);
    }

    fn toggle_sort(&mut self) {
        let Some(column) = self.columns.get(self.selected_column) else {
            return;
        };
        let name = column.name.clone();
        if !self.list.config().is_sortable(&name) {
            self.set_status_message(format!("{name} is not sortable"));
            return;
        }
        self.list.on_sort_toggle(&name);
        let direction = self.list.state().sort_direction;
        self.set_status_message(format!("Sorted by {name} {}", direction.arrow()));
    }

    fn show_more(&mut self) {
        if self.list.on_show_more() {
            let caption = self.list.view().caption();
            self.set_status_message(caption);
        } else {
            let total = self.list.match_count();
            self.set_status_message(format!("All {total} rows shown"));
        }
    }

    fn cycle_category(&mut self, step: isize) {
        if self.list.config().category_field.is_none() {
            self.set_status_message("No categories for this table");
            return;
        }
        let n = self.categories.len() as isize;
        self.category_idx = (self.category_idx as isize + step).rem_euclid(n) as usize;
        let category = self.categories[self.category_idx].clone();
        self.list.on_category_filter_change(category.clone());
        self.row = 0;
        self.offset_row = 0;
        self.set_status_message(format!("Category: {category}"));
    }

    fn clear_query(&mut self) {
        if !self.list.state().query.is_empty() {
            self.list.on_query_change("");
            self.row = 0;
            self.offset_row = 0;
            self.set_status_message("Search cleared");
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.query_before_input = self.list.state().query.clone();
        self.input.set(&self.query_before_input);
        self.uidata.cmdinput = InputResult {
            input: self.query_before_input.clone(),
            curser_pos: self.query_before_input.chars().count(),
            ..InputResult::default()
        };
    }

    fn raw_input(&mut self, key: KeyEvent) {
        let result = self.input.read(key);
        if result.changed {
            self.list.on_query_change(result.input.clone());
            self.row = 0;
            self.offset_row = 0;
        }
        if result.finished {
            if result.canceled && self.list.state().query != self.query_before_input {
                self.list.on_query_change(self.query_before_input.clone());
            }
            info!("Search \"{}\"", self.list.state().query);
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CmdInput;
            let matches = self.list.match_count();
            self.set_status_message(format!("{matches} matches"));
        }
        self.uidata.cmdinput = result;
    }

    fn enter_record_view(&mut self) {
        if self.shown == 0 {
            return;
        }
        self.previous_modus = self.modus;
        self.modus = Modus::Record;
        self.record_idx = self.row;
        self.record_row = 0;
        self.record_offset = 0;
    }

    fn select_record(&mut self, idx: usize) {
        self.record_idx = idx.min(self.shown.saturating_sub(1));
    }

    fn move_record_selection(&mut self, step: isize) {
        let last = self.columns.len().saturating_sub(1);
        self.record_row = self.record_row.saturating_add_signed(step).min(last);
    }

    fn selected_record_values(&self, idx: usize) -> Option<Vec<String>> {
        let view = self.list.view();
        let record = view.rows.get(idx)?;
        Some(
            self.columns
                .iter()
                .map(|c| record.get(&c.name).display())
                .collect(),
        )
    }

    fn copy_table_cell(&mut self) {
        let cell = self
            .selected_record_values(self.row)
            .and_then(|values| values.get(self.selected_column).cloned());
        if let Some(cell) = cell {
            self.copy_to_clipboard(cell);
        }
    }

    fn copy_record_cell(&mut self) {
        let cell = self
            .selected_record_values(self.record_idx)
            .and_then(|values| values.get(self.record_row).cloned());
        if let Some(cell) = cell {
            self.copy_to_clipboard(cell);
        }
    }

    fn copy_table_row(&mut self) {
        let idx = if self.modus == Modus::Record {
            self.record_idx
        } else {
            self.row
        };
        if let Some(values) = self.selected_record_values(idx) {
            let row = values
                .iter()
                .map(|v| wrap_cell_content(v))
                .collect::<Vec<String>>()
                .join(",");
            self.copy_to_clipboard(row);
        }
    }

    fn copy_to_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard not available: {:?}", e);
                    self.set_status_message("Clipboard not available");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => {
                    trace!("Copied content to clipboard.");
                    self.set_status_message("Copied");
                }
                Err(e) => {
                    warn!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Copy failed");
                }
            }
        }
    }

    // ------------------------- View building ------------------------------ //

    fn refresh(&mut self) {
        let view = self.list.view();
        let state = self.list.state();
        let (sort_key, _) = self.list.config().resolve_sort(&state.sort_key);

        self.shown = view.rows.len();
        self.row = self.row.min(self.shown.saturating_sub(1));
        let height = self.layout.table_height;
        if self.row < self.offset_row {
            self.offset_row = self.row;
        } else if self.row >= self.offset_row + height {
            self.offset_row = self.row + 1 - height;
        }

        let cells: Vec<Vec<String>> = view
            .rows
            .iter()
            .map(|record| record_cells(record, &self.columns))
            .collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(cidx, column)| {
                let header = column.name.chars().count() + SORT_MARKER_WIDTH;
                let data = cells
                    .iter()
                    .map(|row| row[cidx].chars().count())
                    .max()
                    .unwrap_or(0);
                std::cmp::min(
                    std::cmp::max(header, data) + COLUMN_WIDTH_MARGIN,
                    self.config.max_column_width,
                )
            })
            .collect();

        self.selected_column = self
            .selected_column
            .min(self.columns.len().saturating_sub(1));
        if self.selected_column < self.offset_column {
            self.offset_column = self.selected_column;
        }
        let mut visible = fit_columns(&widths, self.offset_column, self.layout.width);
        while !visible.contains(&self.selected_column) && self.offset_column < self.selected_column
        {
            self.offset_column += 1;
            visible = fit_columns(&widths, self.offset_column, self.layout.width);
        }

        let headers = visible
            .iter()
            .map(|&cidx| {
                let name = &self.columns[cidx].name;
                HeaderView {
                    name: name.clone(),
                    width: widths[cidx],
                    sortable: self.list.config().is_sortable(name),
                    sort: (name == sort_key).then_some(state.sort_direction),
                }
            })
            .collect();

        let rend = std::cmp::min(self.offset_row + height, cells.len());
        let rows = cells[self.offset_row.min(rend)..rend]
            .iter()
            .map(|row| visible.iter().map(|&cidx| row[cidx].clone()).collect())
            .collect();

        let record = if self.modus == Modus::Record {
            self.record_idx = self.record_idx.min(self.shown.saturating_sub(1));
            view.rows.get(self.record_idx).map(|record| {
                if self.record_row < self.record_offset {
                    self.record_offset = self.record_row;
                } else if self.record_row >= self.record_offset + height {
                    self.record_offset = self.record_row + 1 - height;
                }
                RecordData {
                    title: format!(
                        "{} {}/{}",
                        record.get(&self.list.config().identity_field).display(),
                        self.record_idx + 1,
                        self.shown
                    ),
                    fields: self
                        .columns
                        .iter()
                        .map(|c| (c.name.clone(), record.get(&c.name).display()))
                        .collect(),
                    selected: self.record_row,
                    offset: self.record_offset,
                }
            })
        } else {
            None
        };

        let category = if state.category.is_empty() {
            ALL_CATEGORIES
        } else {
            state.category.as_str()
        };
        let mut title = self.title.clone();
        if self.list.config().category_field.is_some() {
            title.push_str(&format!(" [{category}]"));
        }
        if !state.query.is_empty() {
            title.push_str(&format!(" /{}", state.query));
        }

        debug!(
            "Refresh: {}, rows {}..{}, columns {:?}",
            view.caption(),
            self.offset_row,
            rend,
            visible
        );

        self.uidata = UIData {
            title,
            headers,
            rows,
            selected_row: self.row - self.offset_row.min(self.row),
            selected_column: visible
                .iter()
                .position(|&c| c == self.selected_column)
                .unwrap_or(0),
            caption: view.caption(),
            has_more: view.has_more(),
            record,
            show_popup: self.modus == Modus::Popup,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.uidata.cmdinput.clone(),
            cmd_mode: (self.modus == Modus::CmdInput).then_some(CMDMode::Search),
            active_cmdinput: self.modus == Modus::CmdInput,
            status_message: self.status_message.clone(),
        };
    }
}

fn record_cells(record: &Record, columns: &[Column]) -> Vec<String> {
    columns
        .iter()
        .map(|c| record.get(&c.name).display())
        .collect()
}

/// Columns, starting at `offset`, that fit into `table_width`. The first one always does.
fn fit_columns(widths: &[usize], offset: usize, table_width: usize) -> Vec<usize> {
    let mut visible = Vec::new();
    let mut used = 0;
    for (cidx, width) in widths.iter().enumerate().skip(offset) {
        if visible.is_empty() || used + width + 1 <= table_width {
            visible.push(cidx);
            used += width + 1;
        } else {
            break;
        }
    }
    visible
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}
