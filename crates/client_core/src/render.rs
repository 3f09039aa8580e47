//! Schedule grid rendering.

use comfy_table::{presets::UTF8_FULL, Table};
use shared::protocol::Schedule;

/// A schedule laid out as rows of time slots and columns of days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Absent and empty entries render as blank cells.
pub fn render_schedule(schedule: &Schedule) -> ScheduleTable {
    let header = std::iter::once("Time".to_string())
        .chain(schedule.days.iter().cloned())
        .collect();

    let rows = schedule
        .slots
        .iter()
        .map(|slot| {
            std::iter::once(slot.time.clone())
                .chain(
                    slot.schedule
                        .iter()
                        .map(|item| item.clone().unwrap_or_default()),
                )
                .collect()
        })
        .collect();

    ScheduleTable { header, rows }
}

impl ScheduleTable {
    pub fn to_text(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(self.header.clone());
        for row in &self.rows {
            table.add_row(row.clone());
        }
        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use shared::protocol::Slot;

    use super::*;

    #[test]
    fn renders_time_column_then_days_with_blank_absent_cells() {
        let schedule = Schedule {
            days: vec!["Mon".into(), "Tue".into()],
            slots: vec![Slot {
                time: "9am".into(),
                schedule: vec![Some("Math".into()), None],
            }],
        };

        let table = render_schedule(&schedule);

        assert_eq!(table.header, vec!["Time", "Mon", "Tue"]);
        assert_eq!(table.rows, vec![vec!["9am", "Math", ""]]);
    }

    #[test]
    fn empty_schedule_renders_header_only() {
        let table = render_schedule(&Schedule {
            days: vec!["Monday".into()],
            slots: Vec::new(),
        });

        assert_eq!(table.header, vec!["Time", "Monday"]);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn text_output_contains_every_cell() {
        let table = ScheduleTable {
            header: vec!["Time".into(), "Mon".into()],
            rows: vec![vec!["9:00-10:00".into(), "Maths (Rao)".into()]],
        };

        let text = table.to_text();

        for cell in ["Time", "Mon", "9:00-10:00", "Maths (Rao)"] {
            assert!(text.contains(cell), "missing {cell} in:\n{text}");
        }
    }
}
