use crate::commands::{current_thread_runtime, load_config, CommandResult};
use leadroute_db::{connect_with_config, migrations, DemoSeedDataset, SeedResult};

pub fn run(clean: bool) -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        if clean {
            DemoSeedDataset::clean(&pool)
                .await
                .map_err(|error| ("seed_clean", error.to_string(), 5u8))?;
            pool.close().await;
            return Ok(None);
        }

        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        pool.close().await;

        if !verification.all_present {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(("seed_verification", verification_message(&failed), 6u8));
        }

        Ok::<Option<SeedResult>, (&'static str, String, u8)>(Some(seeded))
    });

    match result {
        Ok(Some(seeded)) => CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded: {} representatives, {} routing rules, \
                 {} percentage allocations",
                seeded.reps_seeded, seeded.rules_seeded, seeded.allocations_seeded
            ),
        ),
        Ok(None) => CommandResult::success("seed", "demo dataset removed"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
