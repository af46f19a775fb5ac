use clap::Parser;
use log::info;

use ddnnf_rs::compiler::{CompilerConfig, DnnfCompiler};
use ddnnf_rs::formula::{Formula, FormulaFactory};
use ddnnf_rs::handler::ExpansionLimit;
use ddnnf_rs::solver::SolverConfig;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of pigeons.
    #[arg(value_name = "INT", default_value = "5")]
    pigeons: usize,

    /// Number of holes.
    #[arg(value_name = "INT", default_value = "5")]
    holes: usize,

    /// Maximum number of Shannon expansions.
    #[clap(long, value_name = "INT", default_value = "1000000")]
    limit: u64,

    /// Disable learnt clause minimization.
    #[clap(long)]
    no_minimization: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Cli::parse();
    info!("args = {:?}", args);

    // Every pigeon sits in some hole, no hole holds two pigeons.
    // With as many holes as pigeons the models are the permutations.
    let f = FormulaFactory::new();
    let p: Vec<Vec<Formula>> = (0..args.pigeons)
        .map(|i| (0..args.holes).map(|j| f.var(&format!("p_{}_{}", i, j))).collect())
        .collect();

    let mut clauses = vec![];
    for row in &p {
        clauses.push(f.or(row.iter().copied()));
    }
    for j in 0..args.holes {
        for i in 0..args.pigeons {
            for k in i + 1..args.pigeons {
                clauses.push(f.or([f.not(p[i][j]), f.not(p[k][j])]));
            }
        }
    }
    let cnf = f.and(clauses);

    let config = CompilerConfig::default()
        .with_solver(SolverConfig::default().with_clause_minimization(!args.no_minimization));
    let mut compiler = DnnfCompiler::new(&f, cnf, &config);
    let mut handler = ExpansionLimit::new(args.limit);
    let result = compiler.compile(&mut handler);
    info!("stats = {:?}", compiler.stats());

    let dnnf = result?;
    let count = f.dnnf_model_count(&ddnnf_rs::dnnf::Dnnf::new(dnnf, (*f.variables(cnf)).clone()));
    println!("{} pigeons in {} holes: {} placements", args.pigeons, args.holes, count);

    Ok(())
}
