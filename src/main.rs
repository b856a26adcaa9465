use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

mod controller;
mod dataset;
mod domain;
mod inputter;
mod listing;
mod logging;
mod model;
mod presets;
mod ui;

use controller::Controller;
use dataset::{Dataset, Record};
use domain::{RxError, ViewerConfig};
use listing::{ListConfig, ListController, SortDirection};
use model::{Model, Status};
use presets::DatasetKind;
use ui::TableUI;

/// Browse precomputed prescribing tables: search, sort and page through them.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Dataset file (json array, csv or parquet)
    path: String,

    /// Table layout to use, detected from the file name if omitted
    #[arg(short, long, value_enum)]
    kind: Option<DatasetKind>,

    /// Initial search text
    #[arg(short, long)]
    query: Option<String>,

    /// Initial category, e.g. a risk level
    #[arg(long)]
    category: Option<String>,

    /// Initial sort field (descending unless --ascending)
    #[arg(long)]
    sort: Option<String>,

    #[arg(long, requires = "sort")]
    ascending: bool,

    /// Rows per page, overrides the table default
    #[arg(long)]
    page_size: Option<usize>,

    #[arg(long, default_value_t = ViewerConfig::default().max_column_width)]
    max_column_width: usize,

    /// Event poll interval in ms
    #[arg(long, default_value_t = ViewerConfig::default().event_poll_time)]
    event_poll_time: u64,

    /// Defaults to rxtv.log in the temp dir
    #[arg(long)]
    log_file: Option<String>,

    /// Print the first page to stdout instead of starting the ui
    #[arg(long)]
    print: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand(path: &str) -> Result<PathBuf, RxError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| RxError::LoadingFailed(e.to_string()))
}

fn run(args: Args) -> Result<(), RxError> {
    let log_file = match &args.log_file {
        Some(path) => expand(path)?,
        None => std::env::temp_dir().join("rxtv.log"),
    };
    logging::init(&log_file)?;
    info!("Starting rxtv {}", env!("CARGO_PKG_VERSION"));

    let path = expand(&args.path)?;
    let kind = args.kind.or_else(|| DatasetKind::detect(&path));
    let dataset = Dataset::load(path)?;

    let (title, list_config) = match kind {
        Some(kind) => (format!("{} · {}", kind.title(), dataset.name), kind.list_config()),
        None => {
            info!("No table layout for {}, inferring one", dataset.name);
            (dataset.name.clone(), ListConfig::infer(&dataset))
        }
    };
    for field in &list_config.search_fields {
        if dataset.column(field).is_none() {
            warn!("Search field \"{field}\" is not in {}", dataset.name);
        }
    }
    let list = initial_list(dataset.records.clone(), list_config, &args);

    let config = ViewerConfig {
        event_poll_time: args.event_poll_time,
        max_column_width: args.max_column_width,
    };

    if args.print {
        print_view(&list, &dataset)
    } else {
        run_ui(&config, title, dataset, list)
    }
}

/// Applies the command line's page size, sort, category and query to a fresh list.
fn initial_list(records: Arc<Vec<Record>>, config: ListConfig, args: &Args) -> ListController {
    let config = match args.page_size {
        Some(page_size) => config.with_page_size(page_size.max(1)),
        None => config,
    };
    let mut list = ListController::new(records, config);
    if let Some(sort) = &args.sort {
        let direction = if args.ascending {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        };
        list.set_sort(sort, direction);
    }
    if let Some(category) = &args.category {
        list.on_category_filter_change(category.as_str());
    }
    if let Some(query) = &args.query {
        list.on_query_change(query.as_str());
    }
    list
}

fn print_view(list: &ListController, dataset: &Dataset) -> Result<(), RxError> {
    let view = list.view();
    let mut out = io::stdout().lock();
    let names: Vec<&str> = dataset.columns.iter().map(|c| c.name.as_str()).collect();
    writeln!(out, "{}", names.join("\t"))?;
    for record in view.rows.iter() {
        let values: Vec<String> = names.iter().map(|n| record.get(n).display()).collect();
        writeln!(out, "{}", values.join("\t"))?;
    }
    writeln!(out, "{}", view.caption())?;
    Ok(())
}

fn run_ui(
    config: &ViewerConfig,
    title: String,
    dataset: Dataset,
    list: ListController,
) -> Result<(), RxError> {
    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), RxError> {
        let size = terminal.size()?;
        let mut model = Model::new(
            config,
            title,
            dataset.columns,
            list,
            size.width as usize,
            size.height as usize,
        );
        let ui = TableUI::new(config);
        let controller = Controller::new(config);

        while model.status != Status::Quitting {
            // Render the current view
            terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

            // Handle events and map to a Message
            let message = controller.handle_event(&model)?;
            model.update(message);
        }
        Ok(())
    })();
    ratatui::restore();
    result
}
