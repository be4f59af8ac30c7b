//! `priority.txt` load/save (spec.md §4.7/§6), grounded on
//! `fast_fsgps/schedule.c`'s `schedule_startup`/`schedule_shutdown`: a flat
//! text file of decimal SV ids, one per line, boosted into the priority
//! table at startup and rewritten from the tracked set at shutdown.

use std::fs;
use std::path::Path;

use crate::config::{MAX_SV_ID, PRIORITY_FILE_BOOST};

/// Applies `+PRIORITY_FILE_BOOST` to every SV id listed in `path`, one per
/// line. A missing file is not an error (spec.md §7): the table is left
/// untouched.
pub fn load(path: &Path, priority: &mut [i32; MAX_SV_ID as usize + 1]) {
    let Ok(contents) = fs::read_to_string(path) else {
        log::debug!("no priority file at {}, starting cold", path.display());
        return;
    };
    for line in contents.lines() {
        let Ok(sv_id) = line.trim().parse::<u8>() else { continue };
        if sv_id >= 1 && sv_id as usize <= MAX_SV_ID as usize {
            priority[sv_id as usize] += PRIORITY_FILE_BOOST;
        }
    }
}

/// Writes the currently tracked SV ids to `path`, one per line, overwriting
/// any existing contents.
pub fn save(path: &Path, tracked: &[u8]) -> std::io::Result<()> {
    let mut body = String::new();
    for sv_id in tracked {
        body.push_str(&sv_id.to_string());
        body.push('\n');
    }
    fs::write(path, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_boosts_listed_svs_and_ignores_malformed_lines() {
        let dir = std::env::temp_dir().join(format!("priority_store_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("priority.txt");
        fs::write(&path, "3\n22\nnot-a-number\n99\n").unwrap();

        let mut priority = [0i32; MAX_SV_ID as usize + 1];
        load(&path, &mut priority);
        assert_eq!(priority[3], PRIORITY_FILE_BOOST);
        assert_eq!(priority[22], PRIORITY_FILE_BOOST);
        assert_eq!(priority[1], 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_leaves_priorities_untouched() {
        let path = Path::new("/nonexistent/path/priority.txt");
        let mut priority = [5i32; MAX_SV_ID as usize + 1];
        load(path, &mut priority);
        assert_eq!(priority[1], 5);
    }

    #[test]
    fn save_writes_one_sv_per_line() {
        let dir = std::env::temp_dir().join(format!("priority_store_test2_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("priority.txt");
        save(&path, &[4, 12, 22]).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "4\n12\n22\n");
        let _ = fs::remove_dir_all(&dir);
    }
}
