//! Part sizing for multipart uploads

use crate::config::{
    Config, DEFAULT_PART_SIZE, MAX_PARTS, MAX_PART_SIZE, MIN_PART_SIZE, PART_SIZE_STEP,
};
use crate::error::{Error, Result};

/// Choose the part size for an object of `total_size` bytes.
///
/// An explicit part-size override wins unconditionally (after a bounds
/// check). Otherwise the default part size grows in fixed increments until
/// the whole object fits within the protocol's part-count ceiling. Pure;
/// no I/O.
pub(crate) fn calculate_part_size(config: &Config, total_size: u64) -> Result<u64> {
    if total_size > config.max_object_size {
        return Err(Error::InvalidArgument(format!(
            "object size {total_size} exceeds maximum of {}",
            config.max_object_size
        )));
    }

    if let Some(part_size) = config.part_size {
        if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&part_size) {
            return Err(Error::InvalidArgument(format!(
                "part size {part_size} outside [{MIN_PART_SIZE}, {MAX_PART_SIZE}]"
            )));
        }
        return Ok(part_size);
    }

    let mut part_size = DEFAULT_PART_SIZE;
    while part_size * MAX_PARTS <= total_size {
        part_size += PART_SIZE_STEP;
    }
    Ok(part_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_OBJECT_SIZE;

    fn config() -> Config {
        Config::new("https://storage.example.com").unwrap()
    }

    #[test]
    fn small_objects_get_the_default_part_size() {
        assert_eq!(calculate_part_size(&config(), 0).unwrap(), DEFAULT_PART_SIZE);
        assert_eq!(
            calculate_part_size(&config(), 200 * 1024 * 1024).unwrap(),
            DEFAULT_PART_SIZE
        );
    }

    #[test]
    fn part_count_stays_under_the_ceiling() {
        let config = config();
        for total_size in [
            0,
            1,
            DEFAULT_PART_SIZE * MAX_PARTS, // first size needing a bump
            1024 * 1024 * 1024 * 1024,     // 1 TiB
            MAX_OBJECT_SIZE,
        ] {
            let part_size = calculate_part_size(&config, total_size).unwrap();
            assert!(
                part_size * MAX_PARTS > total_size,
                "part_size {part_size} cannot cover {total_size} in {MAX_PARTS} parts"
            );
        }
    }

    #[test]
    fn growth_happens_in_fixed_steps() {
        let config = config();
        let bumped = calculate_part_size(&config, DEFAULT_PART_SIZE * MAX_PARTS).unwrap();
        assert_eq!(bumped, DEFAULT_PART_SIZE + PART_SIZE_STEP);
    }

    #[test]
    fn override_wins_unconditionally() {
        let config = config().with_part_size(5 * 1024 * 1024);
        assert_eq!(
            calculate_part_size(&config, 10 * 1024 * 1024 * 1024).unwrap(),
            5 * 1024 * 1024
        );
    }

    #[test]
    fn override_outside_part_limits_is_rejected() {
        let config = config().with_part_size(1024);
        assert!(matches!(
            calculate_part_size(&config, 1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_objects_are_rejected_before_any_io() {
        let config = config();
        assert!(matches!(
            calculate_part_size(&config, MAX_OBJECT_SIZE + 1),
            Err(Error::InvalidArgument(_))
        ));
    }
}
