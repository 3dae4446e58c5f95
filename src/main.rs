//! # Bronze Lake Pipeline
//!
//! ## Visão Geral
//! Congela extratos CSV brutos em partições datadas, valida tipos e
//! cabeçalhos e padroniza colunas categóricas contra um vocabulário canônico.
//!
//! ## Princípios de Engenharia
//! - **Resiliência (Fail-Soft)**: erros em um dataset não abortam os demais.
//! - **Observabilidade**: logs estruturados e tempos de execução por etapa.
//! - **Imutabilidade**: o landing nunca é alterado depois de congelado.
//!
//! ## Uso
//! `bronze_lake [config.toml] [ingest|validate|match|all]`

use std::env;
use std::process;
use std::time::Instant;

use chrono::Local;
use tracing_subscriber::EnvFilter;

use bronze_lake::models::Config;
use bronze_lake::processor::{self, DatasetOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Ingest,
    Validate,
    Match,
    All,
}

impl Stage {
    fn parse(arg: &str) -> Option<Self> {
        match arg {
            "ingest" => Some(Stage::Ingest),
            "validate" => Some(Stage::Validate),
            "match" => Some(Stage::Match),
            "all" => Some(Stage::All),
            _ => None,
        }
    }

    fn includes(self, other: Stage) -> bool {
        self == Stage::All || self == other
    }
}

/// Imprime o resumo da etapa e devolve o número de falhas.
fn report<T>(outcomes: &[DatasetOutcome<T>], describe: impl Fn(&T) -> String) -> usize {
    let mut failures = 0;
    for outcome in outcomes {
        match &outcome.result {
            Ok(value) => println!("  OK    {:<20} {}", outcome.dataset, describe(value)),
            Err(e) => {
                failures += 1;
                eprintln!("  FALHA {:<20} {}", outcome.dataset, e);
            }
        }
    }
    failures
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let global_timer = Instant::now();

    let mut args = env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "lake.toml".to_string());
    let stage_arg = args.next().unwrap_or_else(|| "all".to_string());

    let Some(stage) = Stage::parse(&stage_arg) else {
        eprintln!("Etapa desconhecida: '{}' (use ingest, validate, match ou all)", stage_arg);
        process::exit(2);
    };

    let config = match Config::load_from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Erro na carga de configuração: {}", e);
            process::exit(1);
        }
    };

    println!("--- INICIANDO BRONZE LAKE ({:?}) ---", stage);

    let mut failures = 0;

    if stage.includes(Stage::Ingest) {
        let step_timer = Instant::now();
        let ingest_date = env::var("INGEST_DATE")
            .unwrap_or_else(|_| Local::now().format("%Y-%m-%d").to_string());

        println!("\nIngestão: {}={}", config.partition.key, ingest_date);
        let outcomes = processor::run_ingest(&config, &ingest_date)?;
        failures += report(&outcomes, |r| {
            format!(
                "{} linhas, {} ({}){}",
                r.rows,
                r.encoding,
                &r.sha256[..12],
                if r.already_frozen { " [já congelado]" } else { "" }
            )
        });
        println!("Ingestão concluída ({:.2?})", step_timer.elapsed());
    }

    if stage.includes(Stage::Validate) {
        let step_timer = Instant::now();
        // Sem partição no landing a etapa inteira falha
        let (partition, outcomes) = processor::run_validation(&config)?;
        println!("\nValidação: {}", partition.name());
        failures += report(&outcomes, |r| {
            format!("{} linhas x {} colunas ({})", r.rows, r.columns, r.encoding)
        });
        println!("Validação concluída ({:.2?})", step_timer.elapsed());
    }

    if stage.includes(Stage::Match) {
        let step_timer = Instant::now();
        let (partition, outcomes) = processor::run_canonicalization(&config)?;
        println!("\nPadronização: {}", partition.name());
        failures += report(&outcomes, |r| {
            format!(
                "cobertura {:.1}% (limiar {}, vocabulário {}{}), auditoria {} linhas",
                r.summary.coverage(),
                r.threshold,
                r.vocabulary_size,
                if r.inferred_vocabulary { " inferido" } else { "" },
                r.audit_rows
            )
        });
        println!("Padronização concluída ({:.2?})", step_timer.elapsed());
    }

    println!("\n==========================================");
    println!("Fim do processamento do lake");
    println!("Tempo de execução: {:.2?}", global_timer.elapsed());
    println!("==========================================");

    if failures > 0 {
        eprintln!("{} dataset(s) com falha", failures);
        process::exit(1);
    }

    Ok(())
}
