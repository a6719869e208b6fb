//! Commission ledger schema.
//!
//! Creates the enums, partners, deals, payout batches, the append-only ledger
//! and audit tables, and the triggers that keep the append-only tables
//! immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: PARTNERS & ADMINS
        // ============================================================
        db.execute_unprepared(PARTNERS_SQL).await?;
        db.execute_unprepared(ADMIN_USERS_SQL).await?;

        // ============================================================
        // PART 3: PAYOUT BATCHES & DEALS
        // ============================================================
        db.execute_unprepared(PAYOUT_BATCHES_SQL).await?;
        db.execute_unprepared(DEALS_SQL).await?;

        // ============================================================
        // PART 4: LEDGER & AUDIT
        // ============================================================
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;
        db.execute_unprepared(AUDIT_LOGS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE partner_tier AS ENUM ('referral', 'creator', 'agency', 'enterprise');
CREATE TYPE partner_status AS ENUM ('active', 'suspended', 'terminated');
CREATE TYPE deal_status AS ENUM ('registered', 'under_review', 'approved', 'closed', 'rejected');
CREATE TYPE commission_status AS ENUM ('pending', 'approved', 'reversed', 'paid');
CREATE TYPE payment_status AS ENUM ('pending', 'received', 'commission_paid');
CREATE TYPE ledger_entry_type AS ENUM (
    'commission_earned',
    'commission_approved',
    'commission_paid',
    'refund',
    'adjustment',
    'academy_bonus'
);
CREATE TYPE payout_batch_status AS ENUM ('processing', 'completed');
";

const PARTNERS_SQL: &str = r"
CREATE TABLE partners (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    status partner_status NOT NULL DEFAULT 'active',
    tier partner_tier NOT NULL DEFAULT 'referral',
    tier_override BOOLEAN NOT NULL DEFAULT false,
    tier_locked BOOLEAN NOT NULL DEFAULT false,
    tier_override_reason TEXT,
    tier_last_changed_at TIMESTAMPTZ,
    tier_last_changed_by VARCHAR(64),
    lifetime_referred_revenue NUMERIC(19, 2) NOT NULL DEFAULT 0,
    has_received_academy_bonus BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_partner_revenue_non_negative CHECK (lifetime_referred_revenue >= 0)
);

CREATE INDEX idx_partners_status ON partners(status);
";

const ADMIN_USERS_SQL: &str = r"
CREATE TABLE admin_users (
    id UUID PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL,
    role VARCHAR(32) NOT NULL DEFAULT 'admin',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const PAYOUT_BATCHES_SQL: &str = r"
CREATE TABLE payout_batches (
    id UUID PRIMARY KEY,
    payout_month VARCHAR(7) NOT NULL,
    payout_date DATE NOT NULL,
    total_amount NUMERIC(19, 2) NOT NULL,
    status payout_batch_status NOT NULL DEFAULT 'processing',
    reference_number VARCHAR(255),
    partner_count INTEGER NOT NULL,
    deal_count INTEGER NOT NULL,
    created_by VARCHAR(64) NOT NULL,
    completed_by VARCHAR(64),
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_batch_month_format CHECK (payout_month ~ '^[0-9]{4}-(0[1-9]|1[0-2])$'),
    CONSTRAINT chk_batch_total_positive CHECK (total_amount > 0),
    CONSTRAINT chk_batch_completion CHECK (
        (status = 'processing' AND completed_at IS NULL)
        OR (status = 'completed' AND completed_at IS NOT NULL
            AND reference_number IS NOT NULL AND length(trim(reference_number)) > 0)
    )
);

CREATE INDEX idx_payout_batches_month ON payout_batches(payout_month);
CREATE INDEX idx_payout_batches_status ON payout_batches(status);
";

const DEALS_SQL: &str = r"
CREATE TABLE deals (
    id UUID PRIMARY KEY,
    partner_id UUID NOT NULL REFERENCES partners(id),
    client_name VARCHAR(255) NOT NULL,
    estimated_value NUMERIC(19, 2) NOT NULL,
    final_value NUMERIC(19, 2),
    commission_rate NUMERIC(5, 4) NOT NULL,
    commission_amount NUMERIC(19, 2),
    deal_status deal_status NOT NULL DEFAULT 'registered',
    commission_status commission_status NOT NULL DEFAULT 'pending',
    payment_status payment_status NOT NULL DEFAULT 'pending',
    sale_date TIMESTAMPTZ,
    approval_date TIMESTAMPTZ,
    payout_batch_id UUID REFERENCES payout_batches(id),
    is_synthetic BOOLEAN NOT NULL DEFAULT false,
    notes TEXT,
    rejection_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    version INTEGER NOT NULL DEFAULT 1,
    CONSTRAINT chk_deal_values CHECK (
        estimated_value >= 0
        AND (final_value IS NULL OR final_value >= 0)
        AND (commission_amount IS NULL OR commission_amount >= 0)
    ),
    CONSTRAINT chk_deal_rate CHECK (commission_rate >= 0 AND commission_rate <= 1),
    CONSTRAINT chk_deal_state CHECK (
        (deal_status IN ('registered', 'under_review', 'approved', 'rejected')
            AND commission_status = 'pending' AND payment_status = 'pending')
        OR (deal_status = 'closed' AND (
            (commission_status IN ('pending', 'approved')
                AND payment_status IN ('pending', 'received'))
            OR commission_status = 'reversed'
            OR (commission_status = 'paid' AND payment_status = 'commission_paid')
        ))
    ),
    CONSTRAINT chk_deal_closed_has_sale_date CHECK (
        deal_status <> 'closed' OR sale_date IS NOT NULL
    )
);

CREATE INDEX idx_deals_partner ON deals(partner_id, created_at);
CREATE INDEX idx_deals_sweep ON deals(commission_status, deal_status, sale_date);
CREATE INDEX idx_deals_payable ON deals(partner_id)
    WHERE commission_status = 'approved' AND payout_batch_id IS NULL;
CREATE INDEX idx_deals_batch ON deals(payout_batch_id) WHERE payout_batch_id IS NOT NULL;
";

const LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    partner_id UUID NOT NULL REFERENCES partners(id),
    entry_type ledger_entry_type NOT NULL,
    amount NUMERIC(19, 2) NOT NULL,
    related_deal_id UUID REFERENCES deals(id),
    batch_id UUID REFERENCES payout_batches(id),
    description TEXT,
    created_by VARCHAR(64) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_ledger_amount_non_zero CHECK (amount <> 0),
    CONSTRAINT chk_ledger_amount_sign CHECK (
        amount > 0 OR entry_type IN ('commission_earned', 'adjustment')
    ),
    CONSTRAINT chk_ledger_paid_has_batch CHECK (
        entry_type <> 'commission_paid' OR batch_id IS NOT NULL
    )
);

CREATE INDEX idx_ledger_partner ON ledger_entries(partner_id, created_at, id);
CREATE INDEX idx_ledger_deal ON ledger_entries(related_deal_id) WHERE related_deal_id IS NOT NULL;

-- At most one forward earn, approval and payment per deal
CREATE UNIQUE INDEX uq_ledger_earned_per_deal ON ledger_entries(related_deal_id)
    WHERE entry_type = 'commission_earned' AND amount > 0;
CREATE UNIQUE INDEX uq_ledger_approved_per_deal ON ledger_entries(related_deal_id)
    WHERE entry_type = 'commission_approved';
CREATE UNIQUE INDEX uq_ledger_paid_per_deal ON ledger_entries(related_deal_id)
    WHERE entry_type = 'commission_paid';
CREATE UNIQUE INDEX uq_ledger_academy_bonus ON ledger_entries(partner_id)
    WHERE entry_type = 'academy_bonus';
";

const AUDIT_LOGS_SQL: &str = r"
CREATE TABLE audit_logs (
    id UUID PRIMARY KEY,
    entity_type VARCHAR(32) NOT NULL,
    entity_id UUID NOT NULL,
    action VARCHAR(64) NOT NULL,
    performed_by VARCHAR(64) NOT NULL,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_entity ON audit_logs(entity_type, entity_id, created_at);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: reject_append_only_mutation
-- Ledger entries and audit records are never updated or deleted
-- ============================================================
CREATE OR REPLACE FUNCTION reject_append_only_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION '% on % is not allowed: table is append-only', TG_OP, TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_entries_append_only
BEFORE UPDATE OR DELETE ON ledger_entries
FOR EACH ROW
EXECUTE FUNCTION reject_append_only_mutation();

CREATE TRIGGER trg_audit_logs_append_only
BEFORE UPDATE OR DELETE ON audit_logs
FOR EACH ROW
EXECUTE FUNCTION reject_append_only_mutation();

-- ============================================================
-- FUNCTION: touch_updated_at
-- ============================================================
CREATE OR REPLACE FUNCTION touch_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at := now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_partners_touch
BEFORE UPDATE ON partners
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_deals_touch
BEFORE UPDATE ON deals
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_payout_batches_touch
BEFORE UPDATE ON payout_batches
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();
";

const DROP_ALL_SQL: &str = r"
-- Drop triggers
DROP TRIGGER IF EXISTS trg_payout_batches_touch ON payout_batches;
DROP TRIGGER IF EXISTS trg_deals_touch ON deals;
DROP TRIGGER IF EXISTS trg_partners_touch ON partners;
DROP TRIGGER IF EXISTS trg_audit_logs_append_only ON audit_logs;
DROP TRIGGER IF EXISTS trg_ledger_entries_append_only ON ledger_entries;

-- Drop functions
DROP FUNCTION IF EXISTS touch_updated_at();
DROP FUNCTION IF EXISTS reject_append_only_mutation();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS audit_logs CASCADE;
DROP TABLE IF EXISTS ledger_entries CASCADE;
DROP TABLE IF EXISTS deals CASCADE;
DROP TABLE IF EXISTS payout_batches CASCADE;
DROP TABLE IF EXISTS admin_users CASCADE;
DROP TABLE IF EXISTS partners CASCADE;

-- Drop enums
DROP TYPE IF EXISTS payout_batch_status CASCADE;
DROP TYPE IF EXISTS ledger_entry_type CASCADE;
DROP TYPE IF EXISTS payment_status CASCADE;
DROP TYPE IF EXISTS commission_status CASCADE;
DROP TYPE IF EXISTS deal_status CASCADE;
DROP TYPE IF EXISTS partner_status CASCADE;
DROP TYPE IF EXISTS partner_tier CASCADE;
";
