use std::time::Duration;

use clap::Parser;

use ddnnf_rs::formula::{Formula, FormulaFactory};
use ddnnf_rs::handler::{DnnfHandler, NopHandler, TimeoutHandler};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of queens.
    #[arg(value_name = "INT", default_value = "6")]
    n: usize,

    /// Give up after this many seconds.
    #[clap(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    // Encode N-queens problem as CNF:
    // - at least one queen per row
    // - at most one queen per row, column and diagonal
    let n = args.n;
    println!("Encoding n-queens problem with n = {}", n);
    let f = FormulaFactory::new();
    let queens: Vec<Vec<Formula>> = (0..n)
        .map(|i| (0..n).map(|j| f.var(&format!("q_{}_{}", i, j))).collect())
        .collect();

    let mut clauses: Vec<Formula> = vec![];
    for row in &queens {
        clauses.push(f.or(row.iter().copied()));
    }
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                for l in 0..n {
                    if (i, j) >= (k, l) {
                        continue;
                    }
                    let attacks = i == k
                        || j == l
                        || i as i64 + j as i64 == k as i64 + l as i64
                        || i as i64 - j as i64 == k as i64 - l as i64;
                    if attacks {
                        clauses.push(f.or([f.not(queens[i][j]), f.not(queens[k][l])]));
                    }
                }
            }
        }
    }
    let cnf = f.and(clauses);
    println!("Total {} clauses over {} variables", f.clauses(cnf).len(), f.num_vars());

    let mut handler: Box<dyn DnnfHandler> = match args.timeout {
        Some(secs) => Box::new(TimeoutHandler::new(Duration::from_secs(secs))),
        None => Box::new(NopHandler),
    };

    println!("Compiling...");
    match f.compile_dnnf_with_handler(cnf, handler.as_mut()) {
        Ok(dnnf) => {
            println!("d-DNNF of size {}", f.node_count(dnnf.formula));
            println!("solutions: {}", dnnf.model_count(&f));
        }
        Err(e) => println!("{}", e),
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
