// Two tiers: public (no token) and protected (JWT + active user, under /api).
pub mod protected;
pub mod public;
