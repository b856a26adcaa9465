use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table},
};

use crate::domain::{CMDMode, ViewerConfig};
use crate::model::{HeaderView, RecordData, UIData};

pub const TITLE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 2; // Caption line and command line
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const SORT_MARKER_WIDTH: usize = 2;

const SELECTED_ROW: Style = Style::new().bg(Color::DarkGray);
const SELECTED_CELL: Style = Style::new().add_modifier(Modifier::REVERSED);

pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&self, uidata: &UIData, frame: &mut Frame) {
        let [title_area, body_area, caption_area, cmd_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT as u16),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        frame.render_widget(Line::from(format!(" {} ", uidata.title)).bold(), title_area);

        match &uidata.record {
            Some(record) => self.draw_record(record, frame, body_area),
            None => self.draw_table(uidata, frame, body_area),
        }

        Self::draw_caption(uidata, frame, caption_area);
        Self::draw_cmdline(uidata, frame, cmd_area);

        if uidata.show_popup {
            let area = popup_area(frame.area(), 60, 70);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(uidata.popup_message.as_str())
                    .block(Block::bordered().title(" Help ")),
                area,
            );
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(uidata.headers.iter().map(header_cell))
            .height(TABLE_HEADER_HEIGHT as u16)
            .bold();

        let rows = uidata.rows.iter().enumerate().map(|(ridx, row)| {
            let selected = ridx == uidata.selected_row;
            let cells = row.iter().enumerate().map(|(cidx, value)| {
                let cell = Cell::from(value.as_str());
                if selected && cidx == uidata.selected_column {
                    cell.style(SELECTED_CELL)
                } else {
                    cell
                }
            });
            let row = Row::new(cells);
            if selected { row.style(SELECTED_ROW) } else { row }
        });

        let widths = uidata
            .headers
            .iter()
            .map(|h| Constraint::Length(h.width as u16));

        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, area);

        if uidata.rows.is_empty() {
            let [_, message_area] =
                Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);
            frame.render_widget(Line::from(" No matches".italic()), message_area);
        }
    }

    fn draw_record(&self, record: &RecordData, frame: &mut Frame, area: Rect) {
        let header_width = record
            .fields
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0)
            .min(self.max_column_width);

        let rows = record
            .fields
            .iter()
            .enumerate()
            .skip(record.offset)
            .map(|(idx, (name, value))| {
                let row = Row::new([
                    Cell::from(name.as_str()).bold(),
                    Cell::from(value.as_str()),
                ]);
                if idx == record.selected {
                    row.style(SELECTED_ROW)
                } else {
                    row
                }
            });

        let table = Table::new(
            rows,
            [Constraint::Length(header_width as u16), Constraint::Fill(1)],
        )
        .header(Row::new([Cell::from(record.title.as_str())]).bold())
        .column_spacing(2);
        frame.render_widget(table, area);
    }

    fn draw_caption(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::from(format!(" {}", uidata.caption))];
        if uidata.has_more {
            spans.push(" · ".into());
            spans.push("[m]".blue().bold());
            spans.push(" show more".into());
        }
        let [left, right] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).areas(area);
        frame.render_widget(Line::from(spans), left);
        frame.render_widget(
            Line::from(format!("{} ", uidata.status_message)).right_aligned(),
            right,
        );
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = match uidata.cmd_mode {
                Some(CMDMode::Search) | None => "/",
            };
            let text = format!("{prompt}{}", uidata.cmdinput.input);
            frame.render_widget(Text::from(text).yellow(), area);
            let x = area.x + 1 + uidata.cmdinput.curser_pos as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        } else {
            frame.render_widget(
                Line::from(vec![
                    " / ".blue().bold(),
                    "search ".into(),
                    "s ".blue().bold(),
                    "sort ".into(),
                    "c ".blue().bold(),
                    "category ".into(),
                    "? ".blue().bold(),
                    "help".into(),
                ]),
                area,
            );
        }
    }
}

fn header_cell(header: &HeaderView) -> Cell<'static> {
    match header.sort {
        Some(direction) => Cell::from(format!("{} {}", header.name, direction.arrow())),
        None if header.sortable => Cell::from(header.name.clone()),
        None => Cell::from(header.name.clone()).dim(),
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}
