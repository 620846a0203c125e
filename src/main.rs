use std::error::Error;
use std::time::Instant;

use clap::{Arg, ArgAction, Command};
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

use kneissler_gc::store::DEFAULT_DATA_DIR;
use kneissler_gc::{
    check_basis_against_reference, check_matrix_against_reference, ArtifactStore, FamilyType, FileStore,
    KneisslerContract, KneisslerGVS, SearchCanonizer,
};

const COMPRESS_LEVEL: i32 = 5; // 1-9, 1 is fastest, 9 is best compression

struct Range {
    min_loops: u8,
    max_loops: u8,
    families: Vec<FamilyType>,
}

fn cli() -> Command {
    Command::new("Kneissler graph complex generator")
        .version(clap::crate_version!())
        .author("Thomas Willwacher")
        .about("Creates bases and contraction matrices of the Kneissler graph complexes.")
        .after_help("EXAMPLES:\n    cargo run --release -- even 6 9 0 3\n    cargo run --release -- both 6 9 0 3 -M --compress\n    cargo run --release -- odd 10 10 0 3 --test")
        .arg(
            Arg::new("mode")
                .help("even, odd, both, alltest (rebuilds everything and compares to reference) or allclean (deletes all generated files).")
                .value_parser(["even", "odd", "both", "alltest", "allclean"])
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("min_loops")
                .help("The minimum loop order.")
                .value_parser(clap::value_parser!(u8))
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("max_loops")
                .help("The maximum loop order.")
                .value_parser(clap::value_parser!(u8))
                .required(true)
                .index(3),
        )
        .arg(
            Arg::new("min_type")
                .help("The minimum family type: 0=trivalent generators, 1=relation generators, 2=all trivalent, 3=trivalent complement.")
                .value_parser(clap::value_parser!(u8))
                .required(true)
                .index(4),
        )
        .arg(
            Arg::new("max_type")
                .help("The maximum family type.")
                .value_parser(clap::value_parser!(u8))
                .required(true)
                .index(5),
        )
        .arg(
            Arg::new("overwrite")
                .short('o')
                .long("overwrite")
                .help("Overwrite existing files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("M")
                .short('M')
                .long("matrices")
                .help("Generate or test matrix files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .help("Compare to reference files for verification")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("compress")
                .short('c')
                .long("compress")
                .help("Compress output files.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("data_dir")
                .long("data-dir")
                .help("Directory holding the generated and reference files")
                .value_name("PATH")
                .default_value(DEFAULT_DATA_DIR),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print debug output")
                .action(ArgAction::SetTrue),
        )
}

fn initialise_logging(level_filter: LevelFilter) -> Result<(), Box<dyn Error>> {
    CombinedLogger::init(vec![TermLogger::new(
        level_filter,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let matches = cli().get_matches();

    let verbose = matches.get_flag("verbose");
    initialise_logging(if verbose { LevelFilter::Debug } else { LevelFilter::Info })?;

    let mode = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .ok_or("mode is required")?;
    let overwrite = matches.get_flag("overwrite");
    let test = matches.get_flag("test");
    let gen_matrices = matches.get_flag("M");
    let compress = matches.get_flag("compress");
    let data_dir = matches
        .get_one::<String>("data_dir")
        .ok_or("data directory is required")?;

    let arg = |name: &str| -> Result<u8, Box<dyn Error>> {
        Ok(*matches
            .get_one::<u8>(name)
            .ok_or_else(|| format!("{} is required", name))?)
    };
    let (min_type, max_type) = (arg("min_type")?, arg("max_type")?);
    let range = Range {
        min_loops: arg("min_loops")?,
        max_loops: arg("max_loops")?,
        families: (min_type..=max_type)
            .map(FamilyType::try_from)
            .collect::<Result<_, _>>()?,
    };

    let compress_level = if compress { COMPRESS_LEVEL } else { 0 };
    let store = FileStore::new(data_dir).with_compression(compress_level);

    match mode {
        "alltest" => test_everything(&range, &store),
        "allclean" => clean_all_generated_files(&range, &store),
        _ => {
            let conventions: &[bool] = match mode {
                "even" => &[true],
                "odd" => &[false],
                _ => &[true, false],
            };
            for &even_edges in conventions {
                run(&range, &store, even_edges, overwrite, gen_matrices, test)?;
            }
            Ok(())
        }
    }
}

/// Builds or tests the bases (or matrices with `-M`) for one convention.
fn run(
    range: &Range,
    store: &FileStore,
    even_edges: bool,
    overwrite: bool,
    gen_matrices: bool,
    test: bool,
) -> Result<(), Box<dyn Error>> {
    let oracle = SearchCanonizer;
    for num_loops in range.min_loops..=range.max_loops {
        // ascending types, so that type 3 finds the bases of types 0 and 2
        for &family in &range.families {
            let gvs = KneisslerGVS::new(num_loops, family, even_edges)?;
            let start = Instant::now();

            if test {
                if gen_matrices {
                    if family.has_differential() {
                        let op = KneisslerContract::new(num_loops, family, even_edges)?;
                        info!("Testing matrix file of {} against reference", op);
                        check_matrix_against_reference(&op, &oracle, store)?;
                    }
                } else {
                    info!("Testing basis file of {} against reference", gvs);
                    check_basis_against_reference(&gvs, &oracle, store)?;
                }
                continue;
            }

            if gen_matrices {
                if !family.has_differential() {
                    continue;
                }
                let op = KneisslerContract::new(num_loops, family, even_edges)?;
                let outcome = op.build_matrix(&oracle, store, overwrite)?;
                info!("{}: {:?}, time elapsed: {:?}", op, outcome, start.elapsed());
            } else {
                let outcome = gvs.build_basis(&oracle, store, overwrite)?;
                info!("{}: {:?}, time elapsed: {:?}", gvs, outcome, start.elapsed());
            }
        }
    }
    Ok(())
}

/// Rebuilds all bases and matrices in the range and compares them to the reference files.
fn test_everything(range: &Range, store: &FileStore) -> Result<(), Box<dyn Error>> {
    info!(
        "Testing everything for loops in {}..={} and types {:?}",
        range.min_loops,
        range.max_loops,
        range.families.iter().map(|t| t.index()).collect::<Vec<_>>()
    );
    let oracle = SearchCanonizer;
    let mut num_failed = 0;

    info!("Testing basis generation...");
    for even_edges in [true, false] {
        for num_loops in range.min_loops..=range.max_loops {
            for &family in &range.families {
                let gvs = KneisslerGVS::new(num_loops, family, even_edges)?;
                gvs.build_basis(&oracle, store, true)?;
                if !check_basis_against_reference(&gvs, &oracle, store)?.is_ok() {
                    num_failed += 1;
                }
            }
        }
    }

    info!("Testing matrix generation...");
    for even_edges in [true, false] {
        for num_loops in range.min_loops..=range.max_loops {
            for &family in range.families.iter().filter(|t| t.has_differential()) {
                let op = KneisslerContract::new(num_loops, family, even_edges)?;
                op.build_matrix(&oracle, store, true)?;
                if !check_matrix_against_reference(&op, &oracle, store)?.is_ok() {
                    num_failed += 1;
                }
            }
        }
    }

    if num_failed > 0 {
        return Err(format!("{} artifacts differ from their reference", num_failed).into());
    }
    info!("All tests passed!");
    Ok(())
}

/// Deletes generated bases and matrices (plain and compressed). Reference files are kept.
fn clean_all_generated_files(range: &Range, store: &FileStore) -> Result<(), Box<dyn Error>> {
    info!(
        "Cleaning all generated files for loops in {}..={} below {}",
        range.min_loops,
        range.max_loops,
        store.root().display()
    );
    for even_edges in [true, false] {
        for num_loops in range.min_loops..=range.max_loops {
            for &family in &range.families {
                let gvs = KneisslerGVS::new(num_loops, family, even_edges)?;
                let mut keys = vec![gvs.key()];
                if family.has_differential() {
                    keys.push(KneisslerContract::new(num_loops, family, even_edges)?.key());
                }
                for key in keys {
                    if store.remove(&key)? {
                        info!("Removed {}", store.path(&key).display());
                    } else {
                        warn!("Nothing to remove for {}", key);
                    }
                }
            }
        }
    }
    Ok(())
}
