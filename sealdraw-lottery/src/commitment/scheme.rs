/// Trait for commitment schemes
pub trait CommitmentScheme {
    type Secret;
    type Commitment;

    fn commit(secret: &Self::Secret) -> Self::Commitment;

    fn verify(commitment: &Self::Commitment, secret: &Self::Secret) -> bool;
}
