// Prints an Argon2 PHC string, e.g. for seeding a users row by hand.

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher};

fn main() -> anyhow::Result<()> {
    let Some(password) = std::env::args().nth(1) else {
        anyhow::bail!("usage: hashpass <password>");
    };

    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hashing failed: {e}"))?
        .to_string();
    println!("{phc}");
    Ok(())
}
