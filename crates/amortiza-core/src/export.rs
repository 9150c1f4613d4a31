use std::path::Path;

use chrono::Local;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::metrics::MetricSource;
use crate::presentation::{DashboardView, COMPUTED_MARKER};
use crate::CoreResult;

const MONEY_FORMAT: &str = "\"$\" #,##0.00";
const PERCENT_FORMAT: &str = "0.00\"%\"";

/// Write the schedule and an executive summary to an `.xlsx` workbook.
pub fn export_workbook(view: &DashboardView, path: &Path) -> CoreResult<()> {
    let mut workbook = build_workbook(view)?;
    workbook.save(path)?;
    log::info!("exported {} installments to {}", view.schedule.len(), path.display());
    Ok(())
}

/// Same workbook, as bytes.
pub fn workbook_bytes(view: &DashboardView) -> CoreResult<Vec<u8>> {
    let mut workbook = build_workbook(view)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(view: &DashboardView) -> CoreResult<Workbook> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let money = Format::new().set_num_format(MONEY_FORMAT);
    let percent = Format::new().set_num_format(PERCENT_FORMAT);

    let sheet = workbook.add_worksheet();
    sheet.set_name("Schedule")?;
    write_schedule(sheet, view, &header, &money)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Summary")?;
    write_summary(sheet, view, &header, &money, &percent)?;

    Ok(workbook)
}

fn write_schedule(
    sheet: &mut Worksheet,
    view: &DashboardView,
    header: &Format,
    money: &Format,
) -> CoreResult<()> {
    let titles = ["Installment", "Payment", "Interest", "Principal", "Balance"];
    for (col, title) in titles.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, header)?;
    }
    for (i, row) in view.schedule.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_number(r, 0, row.installment)?;
        sheet.write_number_with_format(r, 1, num(row.payment), money)?;
        sheet.write_number_with_format(r, 2, num(row.interest), money)?;
        sheet.write_number_with_format(r, 3, num(row.principal_portion), money)?;
        sheet.write_number_with_format(r, 4, num(row.balance), money)?;
    }
    sheet.set_column_width(0, 12)?;
    for col in 1..=4 {
        sheet.set_column_width(col, 16)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Count(u32),
    Money(Decimal),
    Percent(Decimal, MetricSource),
}

impl Cell {
    /// Third-column annotation for locally approximated rates.
    fn marker(&self) -> Option<&'static str> {
        match self {
            Cell::Percent(_, source) if source.is_computed() => Some(COMPUTED_MARKER),
            _ => None,
        }
    }
}

fn summary_rows(view: &DashboardView) -> Vec<(&'static str, Cell)> {
    let m = &view.metrics;
    let mut rows = vec![
        ("Bank", Cell::Text(view.bank.clone())),
        ("Amortization system", Cell::Text(view.system.to_string())),
        ("Principal", Cell::Money(view.principal)),
        ("Installments", Cell::Count(view.installments)),
        ("Monthly installment", Cell::Money(view.kpis.first_installment)),
        ("Total interest", Cell::Money(view.kpis.total_interest)),
        ("Total paid", Cell::Money(view.kpis.total_paid)),
        ("TNA", Cell::Percent(view.kpis.nominal_annual_rate, MetricSource::Backend)),
        ("TEM", Cell::Percent(m.monthly_effective_rate, MetricSource::Backend)),
        ("TEA", Cell::Percent(m.annual_effective_rate, m.tea_source)),
        ("CFT", Cell::Money(m.total_financial_cost)),
        ("CFTNA", Cell::Percent(m.nominal_annual_financial_cost, MetricSource::Backend)),
    ];
    match m.effective_annual_financial_cost {
        Some(cftea) => rows.push(("CFTEA", Cell::Percent(cftea, m.cftea_source))),
        None => rows.push(("CFTEA", Cell::Text("n/a".into()))),
    }
    rows
}

fn write_summary(
    sheet: &mut Worksheet,
    view: &DashboardView,
    header: &Format,
    money: &Format,
    percent: &Format,
) -> CoreResult<()> {
    sheet.write_string_with_format(0, 0, "Concept", header)?;
    sheet.write_string_with_format(0, 1, "Value", header)?;
    let mut r = 1u32;
    for (concept, cell) in summary_rows(view) {
        sheet.write_string(r, 0, concept)?;
        if let Some(marker) = cell.marker() {
            sheet.write_string(r, 2, marker)?;
        }
        match cell {
            Cell::Text(text) => {
                sheet.write_string(r, 1, text)?;
            }
            Cell::Count(n) => {
                sheet.write_number(r, 1, n)?;
            }
            Cell::Money(v) => {
                sheet.write_number_with_format(r, 1, num(v), money)?;
            }
            Cell::Percent(v, _) => {
                sheet.write_number_with_format(r, 1, num(v), percent)?;
            }
        }
        r += 1;
    }

    r += 1;
    sheet.write_string(
        r,
        0,
        format!("{COMPUTED_MARKER} computed locally; unmarked rates are published by the bank"),
    )?;
    sheet.write_string(
        r + 1,
        0,
        format!("Generated {}", Local::now().format("%Y-%m-%d %H:%M")),
    )?;
    sheet.set_column_width(0, 22)?;
    sheet.set_column_width(1, 18)?;
    Ok(())
}

fn num(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}
